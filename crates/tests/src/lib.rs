//! End-to-end tests driving a spawned pairpad-api server over real
//! WebSockets. Each test gets a fresh in-process server with its own room
//! store, always in fallback mode (no media backend).


#[cfg(test)]
mod call_tests;
#[cfg(test)]
mod chat_tests;
#[cfg(test)]
mod file_tests;
#[cfg(test)]
mod media_tests;
