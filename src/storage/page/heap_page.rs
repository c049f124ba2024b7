//! Slotted page layout used by heap files.
//!
//! ```text
//! +--------+----------------------+ ... free ... +-----------------+
//! | header | tuple data (grows ->)|              |(<- grows) slots |
//! +--------+----------------------+ ............ +-----------------+
//! ```
//!
//! The header holds the slot count and the free-space pointer. A
//! zero-filled buffer decodes as an empty page, so freshly appended pages
//! need no initialization.

use crate::storage::error::{StorageError, StorageResult};
use byteorder::{ByteOrder, LittleEndian};

// Header structure (4 bytes)
pub const HEADER_SIZE: usize = 4;
const SLOT_COUNT_OFFSET: usize = 0;
const FREE_SPACE_POINTER_OFFSET: usize = 2;

// Slot size (4 bytes: 2 for offset, 2 for length)
pub const SLOT_SIZE: usize = 4;

pub struct HeapPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> HeapPage<B> {
    pub fn from_data(data: B) -> Self {
        Self { data }
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn page_size(&self) -> usize {
        self.bytes().len()
    }

    /// Number of slot entries, including deleted ones.
    pub fn slot_count(&self) -> u16 {
        LittleEndian::read_u16(&self.bytes()[SLOT_COUNT_OFFSET..])
    }

    fn free_space_pointer(&self) -> usize {
        match LittleEndian::read_u16(&self.bytes()[FREE_SPACE_POINTER_OFFSET..]) {
            0 => HEADER_SIZE,
            pointer => pointer as usize,
        }
    }

    fn slot_offset(&self, slot_id: u16) -> usize {
        self.page_size() - (slot_id as usize + 1) * SLOT_SIZE
    }

    fn slot(&self, slot_id: u16) -> (u16, u16) {
        let at = self.slot_offset(slot_id);
        let bytes = self.bytes();
        (
            LittleEndian::read_u16(&bytes[at..]),
            LittleEndian::read_u16(&bytes[at + 2..]),
        )
    }

    fn is_slot_free(&self, slot_id: u16) -> bool {
        self.slot(slot_id) == (0, 0)
    }

    fn first_free_slot(&self) -> Option<u16> {
        (0..self.slot_count()).find(|&slot_id| self.is_slot_free(slot_id))
    }

    fn slot_array_start(&self) -> usize {
        self.page_size()
            .saturating_sub(self.slot_count() as usize * SLOT_SIZE)
    }

    /// The slot array and the free-space pointer must both fit the page.
    fn check_header(&self) -> StorageResult<()> {
        let slot_bytes = self.slot_count() as usize * SLOT_SIZE;
        if HEADER_SIZE + slot_bytes > self.page_size() {
            return Err(StorageError::Corrupted(format!(
                "{} slots do not fit a {} byte page",
                self.slot_count(),
                self.page_size()
            )));
        }
        if self.free_space_pointer() > self.slot_array_start() {
            return Err(StorageError::Corrupted(format!(
                "free space pointer {} runs into the slot array at {}",
                self.free_space_pointer(),
                self.slot_array_start()
            )));
        }
        Ok(())
    }

    /// Contiguous bytes between the tuple data and the slot array.
    pub fn free_space(&self) -> usize {
        self.slot_array_start()
            .saturating_sub(self.free_space_pointer())
    }

    /// Bytes available once deleted tuples are compacted away.
    fn reclaimable_space(&self) -> usize {
        let live_bytes: usize = self.live_tuples().map(|(_, data)| data.len()).sum();
        self.slot_array_start()
            .saturating_sub(HEADER_SIZE + live_bytes)
    }

    fn required_space(&self, tuple_len: usize) -> usize {
        match self.first_free_slot() {
            Some(_) => tuple_len,
            None => tuple_len + SLOT_SIZE,
        }
    }

    /// Whether a tuple of `tuple_len` bytes fits, possibly after compaction.
    /// A page with a damaged header has room for nothing.
    pub fn has_room_for(&self, tuple_len: usize) -> bool {
        self.check_header().is_ok()
            && tuple_len <= u16::MAX as usize
            && self.reclaimable_space() >= self.required_space(tuple_len)
    }

    pub fn get_tuple(&self, slot_id: u16) -> StorageResult<&[u8]> {
        self.check_header()?;

        let slot_count = self.slot_count();
        if slot_id >= slot_count {
            return Err(StorageError::InvalidSlotId {
                slot_id,
                max_slot: slot_count.saturating_sub(1),
            });
        }

        let (offset, length) = self.slot(slot_id);
        if (offset, length) == (0, 0) {
            return Err(StorageError::TupleNotFound { slot_id });
        }

        let start = offset as usize;
        let end = start + length as usize;
        if start < HEADER_SIZE || end > self.slot_array_start() {
            return Err(StorageError::Corrupted(format!(
                "slot {} points at bytes {}..{} outside the tuple area",
                slot_id, start, end
            )));
        }
        Ok(&self.bytes()[start..end])
    }

    /// Verifies the header and every slot, so a reader can reject a damaged
    /// page instead of silently skipping tuples.
    pub fn check(&self) -> StorageResult<()> {
        self.check_header()?;
        for slot_id in 0..self.slot_count() {
            match self.get_tuple(slot_id) {
                Ok(_) | Err(StorageError::TupleNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Iterates over `(slot_id, bytes)` of every live tuple in slot order.
    /// Damaged slots are skipped; see [`HeapPage::check`].
    pub fn live_tuples(&self) -> impl Iterator<Item = (u16, &[u8])> + '_ {
        (0..self.slot_count()).filter_map(move |slot_id| {
            self.get_tuple(slot_id).ok().map(|data| (slot_id, data))
        })
    }

    pub fn tuple_count(&self) -> usize {
        self.live_tuples().count()
    }

    pub fn is_empty(&self) -> bool {
        self.tuple_count() == 0
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HeapPage<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    fn set_slot_count(&mut self, count: u16) {
        LittleEndian::write_u16(&mut self.bytes_mut()[SLOT_COUNT_OFFSET..], count);
    }

    fn set_free_space_pointer(&mut self, pointer: usize) {
        LittleEndian::write_u16(
            &mut self.bytes_mut()[FREE_SPACE_POINTER_OFFSET..],
            pointer as u16,
        );
    }

    fn set_slot(&mut self, slot_id: u16, offset: u16, length: u16) {
        let at = self.slot_offset(slot_id);
        let bytes = self.bytes_mut();
        LittleEndian::write_u16(&mut bytes[at..], offset);
        LittleEndian::write_u16(&mut bytes[at + 2..], length);
    }

    pub fn insert_tuple(&mut self, tuple_data: &[u8]) -> StorageResult<u16> {
        self.check_header()?;

        let required = self.required_space(tuple_data.len());
        if !self.has_room_for(tuple_data.len()) {
            return Err(StorageError::PageFull {
                required,
                available: self.reclaimable_space(),
            });
        }

        if self.free_space() < required {
            self.compact();
        }

        let slot_id = match self.first_free_slot() {
            Some(slot_id) => slot_id,
            None => {
                let slot_id = self.slot_count();
                self.set_slot_count(slot_id + 1);
                slot_id
            }
        };

        let offset = self.free_space_pointer();
        self.bytes_mut()[offset..offset + tuple_data.len()].copy_from_slice(tuple_data);
        self.set_free_space_pointer(offset + tuple_data.len());
        self.set_slot(slot_id, offset as u16, tuple_data.len() as u16);

        Ok(slot_id)
    }

    pub fn delete_tuple(&mut self, slot_id: u16) -> StorageResult<()> {
        self.get_tuple(slot_id)?;
        self.set_slot(slot_id, 0, 0);

        // Trailing free slots give their space back to the page.
        let mut slot_count = self.slot_count();
        while slot_count > 0 && self.is_slot_free(slot_count - 1) {
            slot_count -= 1;
            self.set_slot_count(slot_count);
        }
        if slot_count == 0 {
            self.set_free_space_pointer(HEADER_SIZE);
        }

        Ok(())
    }

    /// Moves live tuples together so all free space is contiguous.
    /// Slot ids are preserved.
    pub fn compact(&mut self) {
        let live: Vec<(u16, Vec<u8>)> = self
            .live_tuples()
            .map(|(slot_id, data)| (slot_id, data.to_vec()))
            .collect();

        let mut offset = HEADER_SIZE;
        for (slot_id, data) in live {
            self.bytes_mut()[offset..offset + data.len()].copy_from_slice(&data);
            self.set_slot(slot_id, offset as u16, data.len() as u16);
            offset += data.len();
        }
        self.set_free_space_pointer(offset);
    }
}
