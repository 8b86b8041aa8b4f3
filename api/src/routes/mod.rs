//! The HTTP health surface. Three JSON endpoints a deployment platform can
//! probe; everything else answers a JSON 404 envelope.

use std::time::Instant;

use actix_web::dev::HttpServiceFactory;
use actix_web::{HttpResponse, Responder, get, web};
use serde_json::json;

use crate::time::TimeSource;

pub struct AppState {
    pub started: Instant,
    pub time_source: TimeSource,
}

pub fn api_services() -> impl HttpServiceFactory {
    (home, health, status)
}

pub async fn not_found() -> impl Responder {
    HttpResponse::NotFound().json(json!({ "error": "Endpoint no encontrado" }))
}

#[get("/")]
async fn home(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "running",
        "service": "Finance Ledger Bot",
        "timestamp": state.time_source.now().to_string(),
        "message": "Bot de finanzas ejecutándose correctamente",
    }))
}

#[get("/health")]
async fn health(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": state.time_source.now().to_string(),
        "uptime": state.started.elapsed().as_secs(),
    }))
}

#[get("/status")]
async fn status(state: web::Data<AppState>) -> impl Responder {
    match process_stats(state.started) {
        Ok(stats) => HttpResponse::Ok().json(json!({
            "status": "running",
            "timestamp": state.time_source.now().to_string(),
            "memory_mb": stats.memory_mb,
            "cpu_percent": stats.cpu_percent,
            "pid": std::process::id(),
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "status": "error",
            "error": e.to_string(),
            "timestamp": state.time_source.now().to_string(),
        })),
    }
}

struct ProcessStats {
    memory_mb: f64,
    cpu_percent: f64,
}

/// Resident memory and a coarse lifetime CPU percentage out of procfs.
/// Fails on platforms without /proc, which the endpoint reports as a 500.
fn process_stats(started: Instant) -> anyhow::Result<ProcessStats> {
    let statm = std::fs::read_to_string("/proc/self/statm")?;
    let resident_pages: f64 = statm
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("malformed /proc/self/statm"))?
        .parse()?;
    let memory_mb = resident_pages * 4096.0 / (1024.0 * 1024.0);

    let stat = std::fs::read_to_string("/proc/self/stat")?;
    // utime and stime are the 2nd and 3rd fields after the comm field,
    // which may itself contain spaces
    let after_comm = stat
        .rsplit_once(')')
        .ok_or_else(|| anyhow::anyhow!("malformed /proc/self/stat"))?
        .1;
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    let utime: f64 = fields
        .get(11)
        .ok_or_else(|| anyhow::anyhow!("malformed /proc/self/stat"))?
        .parse()?;
    let stime: f64 = fields
        .get(12)
        .ok_or_else(|| anyhow::anyhow!("malformed /proc/self/stat"))?
        .parse()?;
    let clock_ticks = 100.0;
    let cpu_seconds = (utime + stime) / clock_ticks;
    let uptime = started.elapsed().as_secs_f64().max(1.0);
    Ok(ProcessStats {
        memory_mb: (memory_mb * 100.0).round() / 100.0,
        cpu_percent: (cpu_seconds / uptime * 10_000.0).round() / 100.0,
    })
}
