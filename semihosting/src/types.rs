//! Protocol-level types shared by the bridge, the console and the suite.

use core::fmt;

/// `SYS_*` operation codes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Syscall {
    Open = 0x01,
    Close = 0x02,
    WriteChar = 0x03,
    WriteNulString = 0x04,
    Write = 0x05,
    Read = 0x06,
    ReadChar = 0x07,
    IsError = 0x08,
    IsTty = 0x09,
    Seek = 0x0A,
    FileLength = 0x0C,
    TempName = 0x0D,
    Remove = 0x0E,
    Rename = 0x0F,
    Clock = 0x10,
    Time = 0x11,
    System = 0x12,
    LastErrno = 0x13,
    ReadCommandLine = 0x15,
    HeapInfo = 0x16,
    Exit = 0x18,
    ExitExtended = 0x20,
    ElapsedTime = 0x30,
    TickFrequency = 0x31,
}

impl Syscall {
    /// The operation's mnemonic as the protocol documents it.
    pub const fn name(self) -> &'static str {
        match self {
            Syscall::Open => "SYS_OPEN",
            Syscall::Close => "SYS_CLOSE",
            Syscall::WriteChar => "SYS_WRITEC",
            Syscall::WriteNulString => "SYS_WRITE0",
            Syscall::Write => "SYS_WRITE",
            Syscall::Read => "SYS_READ",
            Syscall::ReadChar => "SYS_READC",
            Syscall::IsError => "SYS_ISERROR",
            Syscall::IsTty => "SYS_ISTTY",
            Syscall::Seek => "SYS_SEEK",
            Syscall::FileLength => "SYS_FLEN",
            Syscall::TempName => "SYS_TMPNAM",
            Syscall::Remove => "SYS_REMOVE",
            Syscall::Rename => "SYS_RENAME",
            Syscall::Clock => "SYS_CLOCK",
            Syscall::Time => "SYS_TIME",
            Syscall::System => "SYS_SYSTEM",
            Syscall::LastErrno => "SYS_ERRNO",
            Syscall::ReadCommandLine => "SYS_GET_CMDLINE",
            Syscall::HeapInfo => "SYS_HEAPINFO",
            Syscall::Exit => "SYS_EXIT",
            Syscall::ExitExtended => "SYS_EXIT_EXTENDED",
            Syscall::ElapsedTime => "SYS_ELAPSED",
            Syscall::TickFrequency => "SYS_TICKFREQ",
        }
    }
}

impl fmt::Display for Syscall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Syscall> for u32 {
    fn from(value: Syscall) -> Self {
        value as u32
    }
}

/// `fopen()`-style mode strings, numbered as the protocol numbers them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum OpenMode {
    Read = 0,
    ReadBinary = 1,
    ReadPlus = 2,
    ReadBinaryPlus = 3,
    Write = 4,
    WriteBinary = 5,
    WritePlus = 6,
    WriteBinaryPlus = 7,
    Append = 8,
    AppendBinary = 9,
    AppendPlus = 10,
    AppendBinaryPlus = 11,
}

/// Pass/fail result returned by the operations that have no other payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum SemihostingResult {
    Success = 0,
    Failure = -1,
}

impl SemihostingResult {
    pub const fn is_success(self) -> bool {
        matches!(self, SemihostingResult::Success)
    }
}

impl From<i32> for SemihostingResult {
    /// Only an exact 0 is success; every other raw value is a failure.
    fn from(value: i32) -> Self {
        if value == 0 {
            SemihostingResult::Success
        } else {
            SemihostingResult::Failure
        }
    }
}

/// Error codes reported by `SYS_ERRNO`. These follow the GDB File-I/O errno values.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum FileIOErrno {
    /// EPERM
    NotPermitted = 1,
    /// ENOENT
    NoSuchEntity = 2,
    /// EINTR
    SyscallInterrupted = 4,
    /// EIO
    IoError = 5,
    /// EBADF
    BadFd = 9,
    /// EACCES
    AccessError = 13,
    /// EFAULT
    AddressFault = 14,
    /// EBUSY
    Busy = 16,
    /// EEXIST
    AlreadyExists = 17,
    /// ENODEV
    NoSuchDevice = 19,
    /// ENOTDIR
    NotADir = 20,
    /// EISDIR
    IsADir = 21,
    /// EINVAL
    ArgumentInvalid = 22,
    /// ENFILE
    FileTableFull = 23,
    /// EMFILE
    TooManyOpenFiles = 24,
    /// EFBIG
    FileTooLarge = 27,
    /// ENOSPC
    OutOfSpace = 28,
    /// ESPIPE
    IllegalSeek = 29,
    /// EROFS
    FsReadOnly = 30,
    /// ENOSYS
    SyscallInvalid = 88,
    /// ENAMETOOLONG
    FileNameTooLong = 91,
}

impl FileIOErrno {
    pub const ALL: [FileIOErrno; 21] = [
        FileIOErrno::NotPermitted,
        FileIOErrno::NoSuchEntity,
        FileIOErrno::SyscallInterrupted,
        FileIOErrno::IoError,
        FileIOErrno::BadFd,
        FileIOErrno::AccessError,
        FileIOErrno::AddressFault,
        FileIOErrno::Busy,
        FileIOErrno::AlreadyExists,
        FileIOErrno::NoSuchDevice,
        FileIOErrno::NotADir,
        FileIOErrno::IsADir,
        FileIOErrno::ArgumentInvalid,
        FileIOErrno::FileTableFull,
        FileIOErrno::TooManyOpenFiles,
        FileIOErrno::FileTooLarge,
        FileIOErrno::OutOfSpace,
        FileIOErrno::IllegalSeek,
        FileIOErrno::FsReadOnly,
        FileIOErrno::SyscallInvalid,
        FileIOErrno::FileNameTooLong,
    ];
}

impl TryFrom<i32> for FileIOErrno {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        FileIOErrno::ALL
            .into_iter()
            .find(|errno| *errno as i32 == value)
            .ok_or(value)
    }
}

/// Four-word block filled in by `SYS_HEAPINFO`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[repr(C)]
pub struct HeapInfoBlock {
    pub heap_base: usize,
    pub heap_limit: usize,
    pub stack_base: usize,
    pub stack_limit: usize,
}

/// Reason codes for `SYS_EXIT` and `SYS_EXIT_EXTENDED`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ExitReason {
    BranchThroughZero = 0x20000,
    UndefinedInstr = 0x20001,
    SoftwareInterrupt = 0x20002,
    PrefetchAbort = 0x20003,
    DataAbort = 0x20004,
    AddressException = 0x20005,
    Irq = 0x20006,
    Fiq = 0x20007,
    BreakPoint = 0x20020,
    WatchPoint = 0x20021,
    StepComplete = 0x20022,
    RunTimeErrorUnknown = 0x20023,
    InternalError = 0x20024,
    UserInterruption = 0x20025,
    ApplicationExit = 0x20026,
    StackOverflow = 0x20027,
    DivisionByZero = 0x20028,
    OsSpecific = 0x20029,
}

impl From<ExitReason> for usize {
    fn from(value: ExitReason) -> Self {
        value as usize
    }
}
