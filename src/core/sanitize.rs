use crate::error::InvalidIdentifier;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

static NON_ALNUM_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("non-alnum regex"));

static SQL_FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```sql\s*").expect("fence regex"));

/// 拼接进 SQL 文本前的唯一校验，不做任何改写
pub fn sanitize_identifier(name: &str) -> Result<&str, InvalidIdentifier> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(InvalidIdentifier(name.to_string()))
    }
}

/// 入库时的规范化：非字母数字连续段替换为单个下划线，去首尾下划线，转小写
pub fn derive_safe_name(raw: &str) -> String {
    NON_ALNUM_RUN
        .replace_all(raw, "_")
        .trim_matches('_')
        .to_lowercase()
}

/// 文件名去扩展名后得到表名
pub fn table_name_from_file(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    derive_safe_name(stem)
}

/// 规范化结果可能为空或以数字开头，此时补前缀使其成为合法标识符
pub fn ensure_identifier(name: String, fallback: &str) -> String {
    match name.chars().next() {
        None => fallback.to_string(),
        Some(c) if c.is_ascii_digit() => format!("_{}", name),
        Some(_) => name,
    }
}

/// 列名规范化并去重，冲突时追加 _1、_2 …
pub fn dedupe_column_names<I, S>(raw_headers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for (idx, raw) in raw_headers.into_iter().enumerate() {
        let fallback = format!("unnamed_{}", idx);
        let clean = ensure_identifier(derive_safe_name(raw.as_ref()), &fallback);
        let mut candidate = clean.clone();
        let mut i = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}_{}", clean, i);
            i += 1;
        }
        seen.insert(candidate.clone());
        names.push(candidate);
    }
    names
}

/// 存储用文件名：主干规范化，扩展名小写保留
pub fn sanitize_filename(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    let stem = derive_safe_name(stem);
    let ext = ext.to_lowercase();
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!("{}.{}", stem, ext))
}

/// 去掉 markdown 代码块包裹
pub fn clean_sql_output(sql_text: &str) -> String {
    let trimmed = sql_text.trim();
    let without_open = SQL_FENCE_OPEN.replace(trimmed, "");
    let without_open = without_open.trim_start_matches("```");
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
        .to_string()
}
