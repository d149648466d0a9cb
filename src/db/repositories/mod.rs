mod kv_store;
mod session_records;
