// ==========================================
// 加药管理系统 - 命令行入口
// ==========================================
// 用法:
//   chem-dosing import-levels <file> [--confirm]
//   chem-dosing import-supplies <file> [--confirm]
//   chem-dosing import-cws <file> <week-date>
//   chem-dosing import-bws <file> <week-date>
//   chem-dosing report <tank-id> <start> <end> [L|KG|COST]
//   chem-dosing export <file>
//   chem-dosing recalc <tank-id>
//
// 数据库路径: CHEM_DOSING_DB，未设置时使用数据目录下的默认路径
// ==========================================

use anyhow::{anyhow, bail, Context};
use chem_dosing::api::DosingApi;
use chem_dosing::config::ConfigManager;
use chem_dosing::db::{default_db_path, open_sqlite_connection};
use chem_dosing::domain::types::UsageMetric;
use chem_dosing::engine::normalizer::{parse_flexible_date_key, today_local};
use chem_dosing::repository::SqliteStorage;
use chem_dosing::{i18n, logging, ApiError};
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};

const USAGE: &str = "\
usage:
  chem-dosing import-levels <file> [--confirm]
  chem-dosing import-supplies <file> [--confirm]
  chem-dosing import-cws <file> <week-date>
  chem-dosing import-bws <file> <week-date>
  chem-dosing report <tank-id> <start> <end> [L|KG|COST]
  chem-dosing export <file>
  chem-dosing recalc <tank-id>";

fn parse_date(raw: &str) -> anyhow::Result<NaiveDate> {
    parse_flexible_date_key(raw, today_local()).ok_or_else(|| anyhow!("无法识别的日期: {}", raw))
}

fn required<'a>(args: &'a [String], idx: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("缺少参数 <{}>\n{}", name, USAGE))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };
    let confirm = args.iter().any(|a| a == "--confirm");
    let positional: Vec<String> = args.iter().skip(1).filter(|a| !a.starts_with("--")).cloned().collect();

    let db_path = std::env::var("CHEM_DOSING_DB")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| default_db_path().to_string_lossy().into_owned());
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| format!("无法创建目录 {}", parent.display()))?;
        }
    }

    tracing::info!("==================================================");
    tracing::info!("{} v{}", chem_dosing::APP_NAME, chem_dosing::VERSION);
    tracing::info!("使用数据库: {}", db_path);
    tracing::info!("==================================================");

    let conn = Arc::new(Mutex::new(open_sqlite_connection(&db_path)?));
    let storage = SqliteStorage::from_connection(conn.clone())?;
    let settings = ConfigManager::from_connection(conn)?.load_settings()?;
    i18n::set_locale(&settings.locale);

    let api = DosingApi::new(Arc::new(storage), settings);

    match command {
        "import-levels" => {
            let file = required(&positional, 0, "file")?;
            let plan = api.prepare_level_import(file).await?;
            for w in &plan.low_level_warnings {
                println!("[低液位] {} {} {:.1}cm < {}", w.tank_name, w.date, w.level_cm, w.safe_min_level);
            }
            for a in &plan.anomalies.anomalies {
                println!("[异常] {} {} {}", a.tank_name, a.date, a.message);
            }
            for issue in &plan.issues {
                println!("[跳过] 第 {} 行: {}", issue.row, issue.message);
            }
            match api.commit_level_import(&plan, confirm).await {
                Ok(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                Err(ApiError::ConfirmationRequired(msg)) => {
                    println!("{}（加上 --confirm 重新执行）", msg);
                }
                Err(e) => return Err(e.into()),
            }
        }
        "import-supplies" => {
            let file = required(&positional, 0, "file")?;
            let plan = api.prepare_supply_import(file).await?;
            for w in &plan.sg_warnings {
                println!(
                    "[比重] {} SG={} 范围 [{:?}, {:?}]",
                    w.tank_name, w.specific_gravity, w.sg_range_min, w.sg_range_max
                );
            }
            match api.commit_supply_import(&plan, confirm).await {
                Ok(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                Err(ApiError::ConfirmationRequired(msg)) => {
                    println!("{}（加上 --confirm 重新执行）", msg);
                }
                Err(e) => return Err(e.into()),
            }
        }
        "import-cws" | "import-bws" => {
            let file = required(&positional, 0, "file")?;
            let week = parse_date(required(&positional, 1, "week-date")?)?;
            let summary = if command == "import-cws" {
                api.import_cws_params(file, week).await?
            } else {
                api.import_bws_params(file, week).await?
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "report" => {
            let tank_id = required(&positional, 0, "tank-id")?;
            let start = parse_date(required(&positional, 1, "start")?)?;
            let end = parse_date(required(&positional, 2, "end")?)?;
            let metric = match positional.get(3) {
                Some(raw) => UsageMetric::from_str(raw).ok_or_else(|| anyhow!("未知的用量单位: {}", raw))?,
                None => UsageMetric::Volume,
            };
            let report = api.usage_report(tank_id, start, end, metric).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "export" => {
            let file = required(&positional, 0, "file")?;
            let rows = api.export_readings(file).await?;
            println!("已导出 {} 笔读数 → {}", rows, file);
        }
        "recalc" => {
            let tank_id = required(&positional, 0, "tank-id")?;
            let changed = api.recalc_tank(tank_id).await?;
            println!("已重算 {} 笔读数", changed);
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }

    Ok(())
}
