mod fault_injecting;
mod file_io;
mod std_file_io;

pub use fault_injecting::FaultInjectingFileIo;
pub use file_io::FileIo;
pub use std_file_io::StdFileIo;
