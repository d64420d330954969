//! Turns an upload into a named, typed text document

use crate::errors::IngestionError;
use crate::pdf::extract_text_from_pdf;
use docchat_common::db::models::DocumentType;

/// Name given to pasted text without an explicit name
pub const DEFAULT_TEXT_NAME: &str = "Text Document";

/// What the client sent
#[derive(Debug, Clone)]
pub enum UploadSource {
    File {
        name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
    Text {
        name: Option<String>,
        text: String,
    },
}

/// Text ready for storage and chunking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub name: String,
    pub content: String,
    pub doc_type: DocumentType,
}

/// Map a MIME type to a document type.
///
/// Generic or missing types fall back to the file extension.
pub fn detect_type(content_type: Option<&str>, file_name: &str) -> Option<DocumentType> {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match mime.as_str() {
        "application/pdf" => Some(DocumentType::Pdf),
        "text/plain" => Some(DocumentType::Text),
        "text/markdown" | "text/x-markdown" => Some(DocumentType::Markdown),
        "" | "application/octet-stream" => {
            let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
            match extension.as_str() {
                "pdf" => Some(DocumentType::Pdf),
                "txt" | "text" => Some(DocumentType::Text),
                "md" | "markdown" => Some(DocumentType::Markdown),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Extract the text of an upload
pub fn extract(source: UploadSource) -> Result<ExtractedDocument, IngestionError> {
    let document = match source {
        UploadSource::File {
            name,
            content_type,
            bytes,
        } => {
            let doc_type = detect_type(content_type.as_deref(), &name).ok_or_else(|| {
                IngestionError::UnsupportedType {
                    content_type: content_type.unwrap_or_default(),
                }
            })?;

            let content = match doc_type {
                DocumentType::Pdf => extract_text_from_pdf(&bytes, &name)?,
                DocumentType::Text | DocumentType::Markdown => {
                    String::from_utf8_lossy(&bytes).into_owned()
                }
            };

            ExtractedDocument {
                name,
                content,
                doc_type,
            }
        }
        UploadSource::Text { name, text } => ExtractedDocument {
            name: name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_TEXT_NAME.to_string()),
            content: text,
            doc_type: DocumentType::Text,
        },
    };

    if document.content.trim().is_empty() {
        return Err(IngestionError::EmptyContent);
    }

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_type() {
        assert_eq!(detect_type(Some("application/pdf"), "x"), Some(DocumentType::Pdf));
        assert_eq!(
            detect_type(Some("text/plain; charset=utf-8"), "x"),
            Some(DocumentType::Text)
        );
        assert_eq!(detect_type(Some("text/markdown"), "x"), Some(DocumentType::Markdown));
        assert_eq!(
            detect_type(Some("application/octet-stream"), "notes.MD"),
            Some(DocumentType::Markdown)
        );
        assert_eq!(detect_type(None, "paper.pdf"), Some(DocumentType::Pdf));
        assert_eq!(detect_type(Some("image/png"), "a.txt"), None);
        assert_eq!(detect_type(None, "noextension"), None);
    }

    #[test]
    fn test_extract_text_file() {
        let doc = extract(UploadSource::File {
            name: "notes.txt".into(),
            content_type: Some("text/plain".into()),
            bytes: b"hello \xF0world".to_vec(),
        })
        .unwrap();
        assert_eq!(doc.doc_type, DocumentType::Text);
        assert_eq!(doc.name, "notes.txt");
        assert!(doc.content.starts_with("hello "));
    }

    #[test]
    fn test_extract_pdf_upload() {
        let doc = extract(UploadSource::File {
            name: "guide.pdf".into(),
            content_type: Some("application/octet-stream".into()),
            bytes: crate::pdf::tests::one_page_pdf("Lifetimes explained"),
        })
        .unwrap();
        assert_eq!(doc.doc_type, DocumentType::Pdf);
        assert_eq!(doc.name, "guide.pdf");
        assert_eq!(doc.content, "Lifetimes explained");
    }

    #[test]
    fn test_extract_pasted_text_uses_default_name() {
        let doc = extract(UploadSource::Text {
            name: Some("  ".into()),
            text: "some text".into(),
        })
        .unwrap();
        assert_eq!(doc.name, DEFAULT_TEXT_NAME);
        assert_eq!(doc.doc_type, DocumentType::Text);
    }

    #[test]
    fn test_extract_rejects_unsupported_and_empty() {
        let unsupported = extract(UploadSource::File {
            name: "pic.png".into(),
            content_type: Some("image/png".into()),
            bytes: vec![1, 2, 3],
        });
        assert!(matches!(unsupported, Err(IngestionError::UnsupportedType { .. })));

        let empty = extract(UploadSource::Text {
            name: None,
            text: "   \n".into(),
        });
        assert!(matches!(empty, Err(IngestionError::EmptyContent)));
    }
}
