//! Mapping of `mysql_async` errors onto [`ErrorKind`] categories.
//!
//! Server errors are classified by their numeric code. Codes that are not
//! listed fall back to `Internal` below 1000 and `Operational` otherwise.

use mysql_async::{DriverError as MySqlDriverError, Error as MySqlError};
use unitpool::{DriverError, ErrorKind};

const INTEGRITY_CODES: &[u16] = &[1062, 1216, 1217, 1451, 1452, 1215, 1048];

const PROGRAMMING_CODES: &[u16] = &[
    1007, 1149, 1064, 1146, 1102, 1103, 1110, 1111, 1112, 1113, 1179, 1166, 1054,
];

const NOT_SUPPORTED_CODES: &[u16] = &[1196, 1235, 1289, 1286];

const DATA_CODES: &[u16] = &[1265, 1263, 1264, 1230, 1171, 1406, 1441, 1366, 1367];

/// Client-side code reported when a connection cannot be established.
pub(crate) const CONNECT_FAILED: u16 = 2003;

/// Category for a MySQL server error code.
#[must_use]
pub fn kind_for_code(code: u16) -> ErrorKind {
    if INTEGRITY_CODES.contains(&code) {
        ErrorKind::Integrity
    } else if PROGRAMMING_CODES.contains(&code) {
        ErrorKind::Programming
    } else if NOT_SUPPORTED_CODES.contains(&code) {
        ErrorKind::NotSupported
    } else if DATA_CODES.contains(&code) {
        ErrorKind::Data
    } else if code < 1000 {
        ErrorKind::Internal
    } else {
        ErrorKind::Operational
    }
}

/// Convert a `mysql_async` error into a categorized driver error.
pub(crate) fn classify(err: MySqlError) -> DriverError {
    match err {
        MySqlError::Server(server) => {
            DriverError::new(kind_for_code(server.code), server.message).with_code(server.code)
        }
        MySqlError::Io(io) => DriverError::new(ErrorKind::Operational, io.to_string()),
        MySqlError::Driver(driver) => {
            let kind = match driver {
                MySqlDriverError::StmtParamsMismatch { .. } => ErrorKind::Programming,
                _ => ErrorKind::Interface,
            };
            DriverError::new(kind, driver.to_string())
        }
        other => DriverError::new(ErrorKind::Internal, other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(kind_for_code(1062), ErrorKind::Integrity);
        assert_eq!(kind_for_code(1452), ErrorKind::Integrity);
        assert_eq!(kind_for_code(1064), ErrorKind::Programming);
        assert_eq!(kind_for_code(1146), ErrorKind::Programming);
        assert_eq!(kind_for_code(1235), ErrorKind::NotSupported);
        assert_eq!(kind_for_code(1406), ErrorKind::Data);
    }

    #[test]
    fn test_unlisted_codes_fall_back_by_range() {
        assert_eq!(kind_for_code(999), ErrorKind::Internal);
        assert_eq!(kind_for_code(1205), ErrorKind::Operational);
        assert_eq!(kind_for_code(2013), ErrorKind::Operational);
    }

    #[test]
    fn test_reusability_follows_code() {
        assert!(kind_for_code(1062).is_reusable());
        assert!(kind_for_code(1054).is_reusable());
        assert!(!kind_for_code(1366).is_reusable());
        assert!(!kind_for_code(1317).is_reusable());
    }

    #[test]
    fn test_classify_server_error() {
        let err = MySqlError::Server(mysql_async::ServerError {
            code: 1062,
            message: "Duplicate entry 'a' for key 'name'".into(),
            state: "23000".into(),
        });
        let classified = classify(err);
        assert_eq!(classified.kind(), ErrorKind::Integrity);
        assert_eq!(classified.code(), Some(1062));
        assert!(classified.message().contains("Duplicate entry"));
    }

    #[test]
    fn test_classify_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let classified = classify(MySqlError::Io(io.into()));
        assert_eq!(classified.kind(), ErrorKind::Operational);
        assert_eq!(classified.code(), None);
    }

    #[test]
    fn test_classify_mismatched_params() {
        let err = MySqlError::Driver(MySqlDriverError::StmtParamsMismatch {
            required: 2,
            supplied: 1,
        });
        assert_eq!(classify(err).kind(), ErrorKind::Programming);
    }
}
