// Foreign-caller surface: C ABI entry points and logging bootstrap.

pub mod ffi;
pub mod init;
