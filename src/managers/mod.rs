// TabVault state managers
// Managers handle stateful operations: live windows/tabs, capture/restore,
// and the session lifecycle.

pub mod session_manager;
pub mod tab_engine;
pub mod window_manager;
