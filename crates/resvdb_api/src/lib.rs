//! Status-code persistence surface for host code that speaks integer return
//! codes and an error sink instead of typed results.

pub mod api;

pub use api::{
    core_version, delete_attrs_obj, delete_obj, find_obj, init_logging, load_obj, reset_obj,
    save_obj, DbConn, ErrorSink, LastErrorSink, ReportedError, DB_FAILURE, DB_NO_ROWS, DB_OK,
    DB_UNCHANGED, SAVE_NEW, SAVE_QS,
};
