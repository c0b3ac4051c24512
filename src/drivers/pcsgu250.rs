use libloading::Library;
use log::info;
use std::os::raw::c_int;
use crate::drivers::{DriverError, FrameSource};
use crate::types::{ChannelId, DRIVER_BUFFER_LEN};
type FnStart = unsafe extern "C" fn() -> c_int;
type FnDataReady = unsafe extern "C" fn() -> c_int;
type FnReadChannel = unsafe extern "C" fn(*mut c_int);
struct Pcsgu250Api {
    #[allow(dead_code)]
    lib: Library,
    start: FnStart,
    data_ready: FnDataReady,
    read_ch1: FnReadChannel,
    read_ch2: FnReadChannel,
}
impl Pcsgu250Api {
    fn load(library: &str) -> Result<Self, DriverError> {
        // Safety: loading runs the library's initialisers; the vendor DLL has none we depend on.
        let lib = unsafe { Library::new(library) }.map_err(|source| DriverError::LibraryLoad {
            library: library.to_string(),
            source,
        })?;
        // Safety: signatures follow the vendor header (BOOL is a 4-byte int).
        unsafe {
            Ok(Self {
                start: symbol(&lib, "Start_PCSGU250", b"Start_PCSGU250\0")?,
                data_ready: symbol(&lib, "DataReady", b"DataReady\0")?,
                read_ch1: symbol(&lib, "ReadCh1", b"ReadCh1\0")?,
                read_ch2: symbol(&lib, "ReadCh2", b"ReadCh2\0")?,
                lib,
            })
        }
    }
}
unsafe fn symbol<T: Copy>(
    lib: &Library,
    name: &'static str,
    raw: &[u8],
) -> Result<T, DriverError> {
    lib.get::<T>(raw)
        .map(|s| *s)
        .map_err(|source| DriverError::MissingSymbol {
            symbol: name,
            source,
        })
}
/// Frame source backed by the PCSGU250 vendor library.
pub struct Pcsgu250Source {
    api: Pcsgu250Api,
}
impl Pcsgu250Source {
    /// Load the library and start the instrument software.
    pub fn open(library: &str) -> Result<Self, DriverError> {
        let api = Pcsgu250Api::load(library)?;
        let code = unsafe { (api.start)() };
        info!("{library}: Start_PCSGU250 returned {code}");
        Ok(Self { api })
    }
}
impl FrameSource for Pcsgu250Source {
    fn is_data_ready(&mut self) -> Result<bool, DriverError> {
        Ok(unsafe { (self.api.data_ready)() } != 0)
    }
    fn read_channel(&mut self, channel: ChannelId, buf: &mut [i32]) -> Result<(), DriverError> {
        // the driver writes its whole fixed-size block regardless of what we asked for
        if buf.len() < DRIVER_BUFFER_LEN {
            return Err(DriverError::BufferTooSmall {
                expected: DRIVER_BUFFER_LEN,
                actual: buf.len(),
            });
        }
        let read = match channel {
            ChannelId::Ch1 => self.api.read_ch1,
            ChannelId::Ch2 => self.api.read_ch2,
        };
        unsafe { read(buf.as_mut_ptr()) };
        Ok(())
    }
}
