use crate::errors::ApiError;
use actix_multipart::Multipart;
use actix_web::web;
use chrono::Utc;
use futures_util::TryStreamExt;
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct UploadedFile {
    pub original_name: String,
    pub data: Vec<u8>,
}

/// A multipart form reduced to its text fields plus at most one file part
/// (the part named `file`, matching the admin frontend's form).
pub struct CollectedForm {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl CollectedForm {
    pub fn require(&self, name: &str) -> Result<String, ApiError> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::Validation(format!("{} is required", name)))
    }
}

pub async fn collect_form(mut payload: Multipart) -> Result<CollectedForm, ApiError> {
    let mut fields = HashMap::new();
    let mut file = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid upload: {}", e)))?
    {
        let (name, original_name) = {
            let disposition = field.content_disposition();
            (
                disposition.get_name().unwrap_or_default().to_string(),
                disposition.get_filename().map(str::to_string),
            )
        };

        let mut data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ApiError::Validation(format!("Invalid upload: {}", e)))?
        {
            data.extend_from_slice(&chunk);
        }

        match original_name {
            Some(original) if name == "file" => {
                // An empty file part means the form had no selection.
                if !data.is_empty() {
                    file = Some(UploadedFile {
                        original_name: original,
                        data,
                    });
                }
            }
            _ => {
                let value = String::from_utf8(data)
                    .map_err(|e| ApiError::Validation(format!("Invalid form field: {}", e)))?;
                fields.insert(name, value);
            }
        }
    }

    Ok(CollectedForm { fields, file })
}

/// Millisecond prefix keeps concurrent uploads of identically named files
/// apart; a sub-millisecond collision overwrites, which is accepted.
pub fn timestamped_name(original: &str) -> String {
    format!("{}_{}", Utc::now().timestamp_millis(), original)
}

pub async fn store_upload(dir: &str, file: UploadedFile) -> Result<String, ApiError> {
    let dir = dir.to_string();
    let file_name = timestamped_name(&file.original_name);
    let stored_name = file_name.clone();

    web::block(move || -> std::io::Result<()> {
        let upload_path = Path::new(&dir);
        if !upload_path.exists() {
            fs::create_dir_all(upload_path)?;
        }
        fs::write(upload_path.join(&file_name), &file.data)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .map_err(|e| ApiError::Validation(format!("Could not store file. Error: {}", e)))?;

    debug!("Stored uploaded file as {}", stored_name);
    Ok(stored_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamped_name_keeps_the_original_after_the_prefix() {
        let name = timestamped_name("avatar_final.png");
        let (prefix, rest) = name.split_once('_').unwrap();
        assert!(prefix.parse::<i64>().is_ok());
        assert_eq!(rest, "avatar_final.png");
    }

    #[test]
    fn require_reports_the_missing_field_by_name() {
        let form = CollectedForm {
            fields: HashMap::new(),
            file: None,
        };
        let err = form.require("themeColor").unwrap_err();
        assert!(err.to_string().contains("themeColor"));
    }
}
