use anilib_core::handlers::{GetFile, GetReleaseGroup};
use anilib_core::queue::{Command, CommandPayload};

/// A general-queue UDP command with an explicit priority
pub fn group_command(gid: u64, priority: u8) -> Command {
    GetReleaseGroup { gid }
        .into_command()
        .expect("group payload serializes")
        .with_priority(priority)
}

pub fn file_command(size: u64, ed2k: &str) -> Command {
    GetFile::new(size, ed2k)
        .into_command()
        .expect("file payload serializes")
}
