use std::fs;
use std::fs::File;
use std::io::{Error, Read, Write};
use std::mem;
use std::path::{Path, PathBuf};
use log::trace;

#[inline]
pub fn read_u8<R: Read>(reader: &mut R) -> Result<u8, Error> {
    type V = u8;
    let mut buff = [0; mem::size_of::<V>()];
    reader.read_exact(&mut buff)?;
    Ok(V::from_le_bytes(buff))
}

#[inline]
pub fn read_i8<R: Read>(reader: &mut R) -> Result<i8, Error> {
    type V = i8;
    let mut buff = [0; mem::size_of::<V>()];
    reader.read_exact(&mut buff)?;
    Ok(V::from_le_bytes(buff))
}

#[inline]
pub fn read_u16<R: Read>(reader: &mut R) -> Result<u16, Error> {
    let mut buff = [0; mem::size_of::<u16>()];
    reader.read_exact(&mut buff)?;
    Ok(u16::from_le_bytes(buff))
}

#[inline]
pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32, Error> {
    type V = u32;
    let mut buff = [0; mem::size_of::<V>()];
    reader.read_exact(&mut buff)?;
    Ok(V::from_le_bytes(buff))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `bytes` to a sibling temporary file, flushes it, then renames it
/// over `path`. If anything fails the target file is left untouched and the
/// temporary is removed.
pub fn save_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    trace!("save_atomic {}", path.display());
    let tmp = temp_path(path);

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    })();

    match result {
        Ok(()) => fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            e
        }),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}
