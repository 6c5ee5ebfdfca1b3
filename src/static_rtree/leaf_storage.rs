//! Disk storage for leaf pages.
//!
//! The leaf file starts with a little-endian `u64` element count followed by
//! fixed-stride pages. The reader loads pages ONE AT A TIME on demand; there
//! is no bulk loading and no cache at this layer. Each `load_leaf` call is
//! exactly one seek and one read.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::rtree_constants::LEAF_NODE_SIZE;
use super::rtree_types::{LeafPage, RTreeError, RTreeResult};

/// Construction-time sequential writer for the leaf file.
pub struct LeafWriter {
    writer: BufWriter<File>,
    pages_written: u64,
}

impl LeafWriter {
    /// Creates the leaf file and writes the element-count header.
    pub fn create(path: &Path, element_count: u64) -> RTreeResult<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_u64::<LittleEndian>(element_count)?;
        Ok(LeafWriter {
            writer,
            pages_written: 0,
        })
    }

    /// Appends one complete page, including its padding tail.
    pub fn append(&mut self, page: &LeafPage) -> RTreeResult<()> {
        if page.objects.len() > LEAF_NODE_SIZE {
            return Err(RTreeError::Corruption(format!(
                "leaf page holds {} objects, page capacity is {}",
                page.objects.len(),
                LEAF_NODE_SIZE
            )));
        }
        page.write_to(&mut self.writer)?;
        self.pages_written += 1;
        Ok(())
    }

    /// Flushes and syncs the file.
    pub fn finish(mut self) -> RTreeResult<u64> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(self.pages_written)
    }
}

// Each storage instance gets its own id; query threads keep one open file
// handle per (thread, instance) pair because a seek + read pair on a shared
// handle is not atomic.
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static LEAF_HANDLES: RefCell<HashMap<u64, File>> = RefCell::new(HashMap::new());
}

/// Read-only random access to leaf pages.
///
/// Thread safety: the storage itself holds no file handle. Every thread that
/// calls [`LeafStorage::load_leaf`] lazily opens its own handle, stored in
/// thread-local storage keyed by the instance id, so concurrent queries never
/// share seek positions.
pub struct LeafStorage {
    path: PathBuf,
    element_count: u64,
    page_count: u64,
    instance_id: u64,
}

impl LeafStorage {
    /// Opens an existing leaf file and validates its framing.
    pub fn open(path: &Path) -> RTreeResult<Self> {
        if !path.exists() {
            return Err(RTreeError::MissingFile(path.to_path_buf()));
        }
        let file_len = std::fs::metadata(path)?.len();
        if file_len == 0 {
            return Err(RTreeError::EmptyFile(path.to_path_buf()));
        }

        let mut file = File::open(path)?;
        let element_count = file.read_u64::<LittleEndian>()?;
        if element_count == 0 {
            return Err(RTreeError::Corruption(
                "leaf file declares zero elements".into(),
            ));
        }

        let page_count = element_count.div_ceil(LEAF_NODE_SIZE as u64);
        let expected_len = 8 + page_count * LeafPage::ENCODED_SIZE as u64;
        if file_len != expected_len {
            return Err(RTreeError::Corruption(format!(
                "leaf file is {} bytes, {} elements require {}",
                file_len, element_count, expected_len
            )));
        }

        Ok(LeafStorage {
            path: path.to_path_buf(),
            element_count,
            page_count,
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Number of segment records in the file.
    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    /// Number of leaf pages in the file.
    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    /// Loads a single page by index.
    ///
    /// A transient read failure drops this thread's handle and retries once
    /// on a fresh one; a second failure surfaces as
    /// [`RTreeError::ReadFailure`].
    pub fn load_leaf(&self, page_index: u32) -> RTreeResult<LeafPage> {
        if page_index as u64 >= self.page_count {
            return Err(RTreeError::Corruption(format!(
                "leaf page index {} out of range, file holds {} pages",
                page_index, self.page_count
            )));
        }

        let offset = 8 + page_index as u64 * LeafPage::ENCODED_SIZE as u64;
        match self.read_page_at(offset) {
            Ok(page) => Ok(page),
            Err(RTreeError::Io(err)) => {
                log::debug!("resetting stale leaf stream: {}", err);
                self.drop_thread_handle();
                match self.read_page_at(offset) {
                    Ok(page) => Ok(page),
                    Err(RTreeError::Io(err)) => Err(RTreeError::ReadFailure(err)),
                    Err(other) => Err(other),
                }
            }
            Err(other) => Err(other),
        }
    }

    fn read_page_at(&self, offset: u64) -> RTreeResult<LeafPage> {
        LEAF_HANDLES.with(|handles| {
            let mut handles = handles.borrow_mut();
            let file = match handles.entry(self.instance_id) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(File::open(&self.path)?)
                }
            };
            file.seek(SeekFrom::Start(offset))?;
            let mut buffer = vec![0u8; LeafPage::ENCODED_SIZE];
            file.read_exact(&mut buffer)?;
            LeafPage::from_slice(&buffer)
        })
    }

    fn drop_thread_handle(&self) {
        // try_with: the thread-local may already be gone during thread
        // teardown.
        let _ = LEAF_HANDLES.try_with(|handles| {
            handles.borrow_mut().remove(&self.instance_id);
        });
    }
}

impl Drop for LeafStorage {
    fn drop(&mut self) {
        // Handles opened by other threads are reclaimed when those threads
        // exit; the instance id is never reused.
        self.drop_thread_handle();
    }
}
