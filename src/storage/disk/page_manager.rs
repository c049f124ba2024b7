use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{Page, PageId};
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Fixed-size page addressing over one flat file.
///
/// Page `n` lives at byte offset `n * page_size`. The file has no header and
/// the page count is derived from its length.
#[derive(Debug)]
pub struct PageManager {
    file: File,
    page_size: usize,
}

impl PageManager {
    pub fn create(path: &Path, page_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self { file, page_size })
    }

    pub fn open(path: &Path, page_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file, page_size })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Reads page `page_id` into `buf`, which must be exactly one page long.
    pub fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> StorageResult<()> {
        self.check_buffer(buf.len())?;
        self.check_bounds(page_id)?;

        self.file.seek(SeekFrom::Start(self.page_offset(page_id)))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Overwrites an existing page. Pages past the end are not created here.
    pub fn write_page(&mut self, page_id: PageId, data: &[u8]) -> StorageResult<()> {
        self.check_buffer(data.len())?;
        self.check_bounds(page_id)?;

        self.file.seek(SeekFrom::Start(self.page_offset(page_id)))?;
        self.file.write_all(data)?;
        self.file.sync_data()?;
        Ok(())
    }

    pub fn num_pages(&self) -> StorageResult<u32> {
        let file_size = self.file.metadata()?.len();
        Ok((file_size / self.page_size as u64) as u32)
    }

    /// Appends one zero-filled page and returns its number.
    pub fn allocate_page(&mut self) -> StorageResult<u32> {
        let page_no = self.num_pages()?;
        let new_size = (page_no as u64 + 1) * self.page_size as u64;
        self.file.set_len(new_size)?;
        self.file.sync_data()?;

        debug!("allocated page {} ({} bytes)", page_no, self.page_size);
        Ok(page_no)
    }

    /// Reads a page into a freshly allocated [`Page`].
    pub fn load(&mut self, page_id: PageId) -> StorageResult<Page> {
        let mut buf = vec![0u8; self.page_size];
        self.read_page(page_id, &mut buf)?;
        Ok(Page::new(page_id, buf))
    }

    fn page_offset(&self, page_id: PageId) -> u64 {
        page_id.page_no as u64 * self.page_size as u64
    }

    fn check_buffer(&self, len: usize) -> StorageResult<()> {
        if len != self.page_size {
            return Err(StorageError::PageSizeMismatch {
                expected: self.page_size,
                actual: len,
            });
        }
        Ok(())
    }

    fn check_bounds(&self, page_id: PageId) -> StorageResult<()> {
        let page_count = self.num_pages()?;
        if page_id.page_no >= page_count {
            return Err(StorageError::StoreBounds {
                page_id,
                page_count,
            });
        }
        Ok(())
    }
}
