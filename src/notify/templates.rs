//! Message bodies for the mails sharegate sends.

use super::Mail;
use crate::datetime::from_db;
use crate::db::User;
use crate::file::StoredFile;

/// Verification mail for a freshly registered (or re-verifying) user.
pub fn verification_email(user: &User, verify_url: &str) -> Mail {
    let body = format!(
        "Hello {name},\n\
         \n\
         Please confirm your email address by opening the link below:\n\
         \n\
         {verify_url}\n\
         \n\
         The link is valid for 24 hours. If you did not create an account you can ignore this mail.\n",
        name = user.display_name(),
    );

    Mail {
        to: vec![user.email.clone()],
        subject: "Verify your email address".to_string(),
        body,
    }
}

/// Verification URL as served by the frontend.
pub fn verification_url(frontend_url: &str, token: &str) -> String {
    format!("{}/verify-email/{}/", frontend_url.trim_end_matches('/'), token)
}

/// Staff notification sent after an upload.
pub fn upload_notification(file: &StoredFile, uploader: &User, recipients: Vec<String>) -> Mail {
    let uploaded_at = from_db(&file.created_at)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| file.created_at.clone());

    let body = format!(
        "A new file has been uploaded by {uploader}.\n\
         \n\
         File Details:\n\
         Name: {name}\n\
         Type: {file_type}\n\
         Size: {size} bytes\n\
         Uploaded at: {uploaded_at}\n\
         \n\
         You can access the file through the secure file sharing system.\n",
        uploader = uploader.display_name(),
        name = file.original_name,
        file_type = file.declared_type,
        size = file.size_bytes,
    );

    Mail {
        to: recipients,
        subject: format!("New File Uploaded: {}", file.original_name),
        body,
    }
}
