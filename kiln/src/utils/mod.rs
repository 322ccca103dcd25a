//! Small shared helpers.

pub mod checksum;
pub mod rpm;

pub use checksum::{checksums_of, checksums_of_file, FileChecksums};
pub use rpm::{parse_rpm_output, rpm_query_command, RPM_QUERY_FORMAT};
