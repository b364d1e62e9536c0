//! Reasons a boot attempt ends in the recovery shell.

use thiserror::Error;

/// Why control was not handed to the main system.
///
/// Every variant is logged verbatim, so the wording names the specific
/// cause: a missing device reads differently from an unknown filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveryReason {
    #[error("posture is CRITICAL, handoff refused")]
    PostureCritical,

    #[error("posture is DEGRADED and the degraded policy blocks boot")]
    DegradedBlocked,

    #[error("root device {0} not found")]
    DeviceMissing(String),

    #[error("filesystem on {device} not recognized: {detail}")]
    FilesystemUnrecognized { device: String, detail: String },

    #[error("I/O error mounting {device}: {detail}")]
    MountIo { device: String, detail: String },

    #[error("no entry point in {root} (tried {tried})")]
    EntryPointAbsent { root: String, tried: String },

    #[error("control transfer failed: {0}")]
    TransferFailed(String),

    #[error("internal fault: {0}")]
    InternalFault(String),
}

impl RecoveryReason {
    /// Mount-stage failure (as opposed to validation or policy).
    pub fn is_mount_failure(&self) -> bool {
        matches!(
            self,
            RecoveryReason::DeviceMissing(_)
                | RecoveryReason::FilesystemUnrecognized { .. }
                | RecoveryReason::MountIo { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_cause() {
        let missing = RecoveryReason::DeviceMissing("/dev/mmcblk0p2".into());
        assert_eq!(missing.to_string(), "root device /dev/mmcblk0p2 not found");

        let absent = RecoveryReason::EntryPointAbsent {
            root: "/newroot".into(),
            tried: "sbin/init".into(),
        };
        assert_eq!(absent.to_string(), "no entry point in /newroot (tried sbin/init)");
        assert!(!absent.is_mount_failure());
        assert!(missing.is_mount_failure());
    }
}
