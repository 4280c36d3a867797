//! Re-exported from `arborist-core`, where it lives so the Runner Adapter
//! can race a subprocess wait against it too.

pub use arborist_core::shutdown::ShutdownSignal;
