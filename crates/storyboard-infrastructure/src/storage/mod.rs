mod locked_json;

pub use locked_json::LockedJsonFile;
