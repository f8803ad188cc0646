use std::collections::BTreeMap;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use log::{info, warn};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::AttrMap;

/// 找不到配置的 id 列时依次尝试的候选列名
const ID_COLUMN_CANDIDATES: [&str; 6] = ["id", "ID", "Id", "image_id", "filename", "name"];

/// 元数据表，按记录标识索引的属性集合
pub type MetadataTable = BTreeMap<String, AttrMap>;

/// 加载元数据表，支持分隔符文件（.csv）与电子表格（.xlsx / .xls）
pub fn load_metadata(path: &Path, id_column: &str) -> Result<MetadataTable> {
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let table = match ext.as_str() {
        "csv" => load_csv(path, id_column)?,
        "xlsx" | "xls" => load_excel(path, id_column)?,
        _ => {
            return Err(Error::InputValidation(format!(
                "不支持的元数据文件格式: .{ext}，支持 .csv / .xlsx / .xls"
            )));
        }
    };
    info!("从 {} 加载了 {} 行元数据", path.display(), table.len());
    Ok(table)
}

fn load_csv(path: &Path, id_column: &str) -> Result<MetadataTable> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::InputValidation(format!("无法读取元数据文件 {}: {e}", path.display())))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::InputValidation(format!("元数据表头解析失败: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let id_idx = resolve_id_column(&headers, id_column)?;

    let mut table = MetadataTable::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| Error::InputValidation(format!("元数据行解析失败: {e}")))?;
        let Some(id) = record.get(id_idx).map(|s| s.trim().to_string()) else {
            continue;
        };
        if id.is_empty() {
            continue;
        }
        let mut attributes = AttrMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if idx == id_idx {
                continue;
            }
            attributes.insert(header.clone(), parse_scalar(record.get(idx).unwrap_or_default()));
        }
        insert_row(&mut table, id, attributes);
    }
    Ok(table)
}

fn load_excel(path: &Path, id_column: &str) -> Result<MetadataTable> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::InputValidation(format!("无法读取电子表格 {}: {e}", path.display())))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::InputValidation("电子表格中没有工作表".to_string()))?
        .map_err(|e| Error::InputValidation(format!("工作表解析失败: {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| Error::InputValidation("电子表格缺少表头行".to_string()))?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    let id_idx = resolve_id_column(&headers, id_column)?;

    let mut table = MetadataTable::new();
    for row in rows {
        let Some(id_cell) = row.get(id_idx) else {
            continue;
        };
        let id = cell_id_string(id_cell);
        if id.is_empty() {
            continue;
        }
        let mut attributes = AttrMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if idx == id_idx {
                continue;
            }
            let value = row.get(idx).map(cell_to_value).unwrap_or(Value::Null);
            attributes.insert(header.clone(), value);
        }
        insert_row(&mut table, id, attributes);
    }
    Ok(table)
}

fn insert_row(table: &mut MetadataTable, id: String, attributes: AttrMap) {
    if table.contains_key(&id) {
        warn!("元数据标识重复，保留首次出现的行: {id}");
        return;
    }
    table.insert(id, attributes);
}

/// 确定 id 列的下标：先用配置列名，再尝试常见候选名，最后退回第一列
fn resolve_id_column(headers: &[String], id_column: &str) -> Result<usize> {
    if headers.is_empty() {
        return Err(Error::InputValidation("元数据表没有任何列".to_string()));
    }
    if let Some(idx) = headers.iter().position(|h| h == id_column) {
        return Ok(idx);
    }
    for candidate in ID_COLUMN_CANDIDATES {
        if let Some(idx) = headers.iter().position(|h| h == candidate) {
            info!("使用 '{candidate}' 作为 id 列");
            return Ok(idx);
        }
    }
    warn!("找不到 id 列 '{id_column}'，退回第一列 '{}'", headers[0]);
    Ok(0)
}

/// 把单元格文本解析为 JSON 标量：整数、浮点数、字符串，空白为 null
fn parse_scalar(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::from(f);
    }
    Value::from(raw)
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => Value::from(*f),
        Data::Bool(b) => Value::from(*b),
        Data::String(s) => parse_scalar(s),
        Data::DateTime(dt) => Value::from(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::from(s.as_str()),
        Data::Error(e) => {
            warn!("电子表格单元格错误: {e:?}");
            Value::Null
        }
    }
}

/// 电子表格的 id 单元格转字符串，整数值不带小数点（与分隔符文件保持一致）
fn cell_id_string(cell: &Data) -> String {
    match cell {
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        std::fs::write(file.path(), content).unwrap();
        file
    }

    #[test]
    fn csv_values_parse_to_typed_scalars() {
        let file = write_csv("id,age,weight,gender,notes\n001_01,35,75.5,male,\n");
        let table = load_metadata(file.path(), "id").unwrap();
        let row = &table["001_01"];
        assert_eq!(row["age"], serde_json::json!(35));
        assert_eq!(row["weight"], serde_json::json!(75.5));
        assert_eq!(row["gender"], serde_json::json!("male"));
        assert_eq!(row["notes"], serde_json::Value::Null);
        // id 列本身不进入属性集合
        assert!(!row.contains_key("id"));
    }

    #[test]
    fn id_column_falls_back_to_candidates() {
        let file = write_csv("image_id,size\n001_02,42\n");
        let table = load_metadata(file.path(), "id").unwrap();
        assert!(table.contains_key("001_02"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        match load_metadata(file.path(), "id") {
            Err(Error::InputValidation(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn duplicate_ids_keep_first_row() {
        let file = write_csv("id,v\nx,1\nx,2\n");
        let table = load_metadata(file.path(), "id").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table["x"]["v"], serde_json::json!(1));
    }

    #[test]
    fn rows_have_identical_columns() {
        let file = write_csv("id,a,b\n1,x,\n2,,y\n");
        let table = load_metadata(file.path(), "id").unwrap();
        for row in table.values() {
            let cols: Vec<&String> = row.keys().collect();
            assert_eq!(cols, ["a", "b"]);
        }
    }
}
