// ==========================================
// Scrap Recycling - Action Log Repository
// ==========================================
// Rule: every successful workflow command is recorded
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use self::core::ActionLogRepository;
