mod kv;
pub use kv::KeyValue;

mod run_env;
pub use run_env::RunEnv;

mod run_id;
pub use run_id::RunId;

mod run_state;
pub use run_state::RunState;

mod run_event;
pub use run_event::RunEvent;

mod run_info;
pub use run_info::Run;

mod run_query;
pub use run_query::{RunPage, RunQuery};

mod log_record;
pub use log_record::LogRecord;

mod error;
pub use error::ModelError;

pub(crate) mod time_serde;
