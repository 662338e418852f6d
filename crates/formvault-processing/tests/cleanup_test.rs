mod helpers;

use formvault_core::models::FolderPath;
use formvault_processing::{CleanupReport, Conversion, TargetShape};
use helpers::fixtures::upload_entry;
use helpers::setup_test_app;
use serde_json::json;

#[tokio::test]
async fn test_cleanup_removes_files_and_engine_folder() {
    let app = setup_test_app().await;
    let options = app.options("attachments");
    let raw = json!({
        "0": upload_entry(&app, "a.pdf", b"a"),
        "1": upload_entry(&app, "b.pdf", b"b"),
    });
    let conversion = app.convert(&raw, TargetShape::Collection, &options).await;
    assert_eq!(conversion.resources().len(), 2);

    let report = app.cleanup().delete_uploads(&conversion).await;

    assert_eq!(
        report,
        CleanupReport {
            deleted_files: 2,
            deleted_folders: 1,
            failed_files: 0,
        }
    );
    for resource in conversion.resources() {
        assert!(app.store.get_file(resource.file.id).await.is_err());
    }
    assert!(!app.store.folder_exists(&app.session_folder()).await.unwrap());
    // The configured parent folder is not engine-owned and stays.
    let parent = FolderPath::parse("user_upload").unwrap();
    assert!(app.store.folder_exists(&parent).await.unwrap());
}

#[tokio::test]
async fn test_cleanup_counts_missing_files() {
    let app = setup_test_app().await;
    let options = app.options("attachment");
    let conversion = app
        .convert(&upload_entry(&app, "a.pdf", b"a"), TargetShape::Single, &options)
        .await;

    let first = app.cleanup().delete_uploads(&conversion).await;
    assert_eq!(first.deleted_files, 1);

    let second = app.cleanup().delete_uploads(&conversion).await;
    assert_eq!(second.deleted_files, 0);
    assert_eq!(second.failed_files, 1);
    assert_eq!(second.deleted_folders, 0);
}

#[tokio::test]
async fn test_cleanup_of_empty_or_rejected_conversion() {
    let app = setup_test_app().await;
    let report = app.cleanup().delete_uploads(&Conversion::Empty).await;
    assert_eq!(report, CleanupReport::default());

    let rejected = Conversion::Rejected(formvault_core::UploadError::validation("X", "x"));
    assert_eq!(
        app.cleanup().delete_uploads(&rejected).await,
        CleanupReport::default()
    );
}
