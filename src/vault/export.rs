//! CSV export of vault metadata. Never includes secret material.

use chrono::Utc;

use super::types::{PasswordItem, VaultItem};

pub const DOCUMENT_HEADERS: [&str; 7] = [
    "id",
    "title",
    "type",
    "tags",
    "ftuId",
    "sensitivity",
    "createdAt",
];

pub const PASSWORD_HEADERS: [&str; 7] = [
    "id",
    "title",
    "username",
    "url",
    "tags",
    "ftuId",
    "createdAt",
];

/// Escape one CSV cell.
///
/// Leading `= + - @`, tab or whitespace gets a `'` prefix so spreadsheet apps
/// do not evaluate the cell as a formula.
pub fn escape_cell(value: &str) -> String {
    let mut cell = value.to_string();
    if cell
        .chars()
        .next()
        .is_some_and(|c| matches!(c, '=' | '+' | '-' | '@') || c.is_whitespace())
    {
        cell.insert(0, '\'');
    }
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell
    }
}

fn to_csv<const N: usize>(headers: &[&str; N], rows: impl Iterator<Item = [String; N]>) -> String {
    let mut lines = vec![headers
        .iter()
        .map(|h| escape_cell(h))
        .collect::<Vec<_>>()
        .join(",")];
    for row in rows {
        lines.push(row.iter().map(|c| escape_cell(c)).collect::<Vec<_>>().join(","));
    }
    lines.join("\n")
}

pub fn documents_csv(items: &[VaultItem]) -> String {
    to_csv(
        &DOCUMENT_HEADERS,
        items.iter().map(|d| {
            [
                d.id.to_string(),
                d.title.clone(),
                d.kind.as_str().to_string(),
                d.tags.join("; "),
                d.ftu_id.clone().unwrap_or_default(),
                d.sensitivity.as_str().to_string(),
                d.created_at.to_rfc3339(),
            ]
        }),
    )
}

pub fn passwords_csv(items: &[PasswordItem]) -> String {
    to_csv(
        &PASSWORD_HEADERS,
        items.iter().map(|p| {
            [
                p.id.to_string(),
                p.title.clone(),
                p.username.clone().unwrap_or_default(),
                p.url.clone().unwrap_or_default(),
                p.tags.join("; "),
                p.ftu_id.clone().unwrap_or_default(),
                p.created_at.to_rfc3339(),
            ]
        }),
    )
}

/// Dated download name, e.g. `vault-metadata-2024-05-01.csv`.
pub fn export_file_name(prefix: &str) -> String {
    format!("{}-{}.csv", prefix, Utc::now().format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::types::{DocumentKind, Sensitivity};
    use uuid::Uuid;

    #[test]
    fn escape_cell_handles_formulas_and_quotes() {
        assert_eq!(escape_cell("plain"), "plain");
        assert_eq!(escape_cell("=SUM(A1:A2)"), "'=SUM(A1:A2)");
        assert_eq!(escape_cell("-5"), "'-5");
        assert_eq!(escape_cell(" padded"), "' padded");
        assert_eq!(escape_cell("a,b"), "\"a,b\"");
        assert_eq!(escape_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_cell("@cmd,x"), "\"'@cmd,x\"");
        assert_eq!(escape_cell(""), "");
    }

    #[test]
    fn passwords_csv_omits_secrets() {
        let item = PasswordItem {
            id: Uuid::nil(),
            user_id: "alice".to_string(),
            title: "Bank".to_string(),
            username: Some("ceo".to_string()),
            url: None,
            password_enc: "SECRET-BLOB".to_string(),
            tags: vec!["finance".to_string(), "ops".to_string()],
            ftu_id: None,
            created_at: Utc::now(),
        };
        let csv = passwords_csv(&[item]);
        let mut lines = csv.lines();

        assert_eq!(lines.next(), Some("id,title,username,url,tags,ftuId,createdAt"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("00000000-0000-0000-0000-000000000000,Bank,ceo,,finance; ops,,"));
        assert!(!csv.contains("SECRET-BLOB"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn documents_csv_omits_note_body() {
        let item = VaultItem {
            id: Uuid::nil(),
            user_id: "alice".to_string(),
            title: "Ideas, raw".to_string(),
            kind: DocumentKind::Note,
            value: Some("private body".to_string()),
            storage_path: None,
            file_size: None,
            file_type: None,
            tags: vec![],
            ftu_id: Some("FTU-9".to_string()),
            sensitivity: Sensitivity::High,
            created_at: Utc::now(),
        };
        let csv = documents_csv(&[item]);
        assert!(csv.starts_with("id,title,type,tags,ftuId,sensitivity,createdAt\n"));
        assert!(csv.contains(",\"Ideas, raw\",note,,FTU-9,High,"));
        assert!(!csv.contains("private body"));
    }

    #[test]
    fn export_file_name_is_dated() {
        let name = export_file_name("vault-metadata");
        assert!(name.starts_with("vault-metadata-"));
        assert!(name.ends_with(".csv"));
        assert_eq!(name.len(), "vault-metadata-2024-01-01.csv".len());
    }
}
