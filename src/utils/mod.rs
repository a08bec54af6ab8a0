pub mod logging;

pub use logging::{
    append_log_line, init, init_log_file, log_jobs_loaded, print_final_stats, truncate_text,
};
