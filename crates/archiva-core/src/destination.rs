//! Archive destination resolution
//!
//! Computes where a data object lands inside a backend, given the tenant's
//! base archive destination.

use uuid::Uuid;

use crate::models::{ArchiveType, FileLocation};

/// Compute the archive location of a data object.
///
/// For [`ArchiveType::Archive`] the result is deterministic:
/// `base.file_id / caller_namespace / logical_path` with separators collapsed.
/// `unique` appends `_<uuid>` so repeated uploads never overwrite each other.
///
/// For [`ArchiveType::TemporaryArchive`] the logical path is ignored and the
/// object is parked under a fresh UUID below the base, so concurrent staging
/// uploads cannot collide.
///
/// The container is always copied from `base`.
pub fn resolve_archive_destination(
    base: &FileLocation,
    logical_path: &str,
    caller_namespace: Option<&str>,
    archive_type: ArchiveType,
    unique: bool,
) -> FileLocation {
    let file_id = match archive_type {
        ArchiveType::Archive => {
            let mut joined = join_segments(&[
                base.file_id.as_str(),
                caller_namespace.unwrap_or_default(),
                logical_path,
            ]);
            if unique {
                joined.push('_');
                joined.push_str(&Uuid::new_v4().to_string());
            }
            joined
        }
        ArchiveType::TemporaryArchive => {
            join_segments(&[base.file_id.as_str(), &Uuid::new_v4().to_string()])
        }
    };

    FileLocation {
        container_id: base.container_id.clone(),
        file_id,
    }
}

/// Join path parts with `/`, collapsing repeated separators and dropping a
/// trailing one. A leading separator on the first non-empty part is kept.
fn join_segments(parts: &[&str]) -> String {
    let leading = parts
        .iter()
        .find(|p| !p.is_empty())
        .is_some_and(|p| p.starts_with('/'));

    let body = parts
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if leading {
        format!("/{}", body)
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> FileLocation {
        FileLocation::new("archive-bucket", "/dme/archive/")
    }

    #[test]
    fn test_archive_destination_is_deterministic() {
        let first = resolve_archive_destination(
            &base(),
            "/CCR_Tenant/project/run1.fastq",
            Some("user-17"),
            ArchiveType::Archive,
            false,
        );
        let second = resolve_archive_destination(
            &base(),
            "/CCR_Tenant/project/run1.fastq",
            Some("user-17"),
            ArchiveType::Archive,
            false,
        );

        assert_eq!(first, second);
        assert_eq!(first.container_id, "archive-bucket");
        assert_eq!(
            first.file_id,
            "/dme/archive/user-17/CCR_Tenant/project/run1.fastq"
        );
    }

    #[test]
    fn test_archive_destination_without_namespace() {
        let location = resolve_archive_destination(
            &FileLocation::new("bucket", "archive"),
            "Tenant//a.dat",
            None,
            ArchiveType::Archive,
            false,
        );
        assert_eq!(location.file_id, "archive/Tenant/a.dat");
    }

    #[test]
    fn test_absolute_base_and_path_join_once() {
        let location = resolve_archive_destination(
            &FileLocation::new("bucket", "/archive"),
            "/a/b",
            None,
            ArchiveType::Archive,
            false,
        );
        assert_eq!(location.file_id, "/archive/a/b");
        assert_eq!(location.container_id, "bucket");
    }

    #[test]
    fn test_empty_namespace_adds_no_segment() {
        let location = resolve_archive_destination(
            &base(),
            "/Tenant/a.dat",
            Some(""),
            ArchiveType::Archive,
            false,
        );
        assert_eq!(location.file_id, "/dme/archive/Tenant/a.dat");
    }

    #[test]
    fn test_unique_archive_destination_gets_suffix() {
        let location = resolve_archive_destination(
            &base(),
            "/Tenant/a.dat",
            None,
            ArchiveType::Archive,
            true,
        );
        let suffix = location
            .file_id
            .strip_prefix("/dme/archive/Tenant/a.dat_")
            .expect("suffix after the logical path");
        assert!(Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn test_temporary_destination_is_fresh_uuid_under_base() {
        let first = resolve_archive_destination(
            &base(),
            "/Tenant/a.dat",
            Some("ns"),
            ArchiveType::TemporaryArchive,
            false,
        );
        let second = resolve_archive_destination(
            &base(),
            "/Tenant/a.dat",
            Some("ns"),
            ArchiveType::TemporaryArchive,
            false,
        );

        assert_ne!(first.file_id, second.file_id);
        let leaf = first.file_id.strip_prefix("/dme/archive/").unwrap();
        assert!(Uuid::parse_str(leaf).is_ok());
        assert!(!first.file_id.contains("Tenant"));
        assert_eq!(first.container_id, "archive-bucket");
    }
}
