// src/web.rs
use crate::analysis::{CrossoverSummary, analyze_crossovers};
use crate::app::ChartEngine;
use crate::error::{AppError, Result};
use crate::pipeline::{Overlay, ParamsPatch};
use crate::series::{Interval, Range};
use crate::trades::{NewTrade, TradeLog, TradePatch};
use actix_web::{App, HttpResponse, HttpServer, delete, get, post, put, web};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ChartEngine>,
    pub trades: Arc<TradeLog>,
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    ticker: String,
    range: Range,
    interval: Interval,
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    overlay: Overlay,
    enabled: bool,
}

/// Full chart state: query, pipeline state, price series and the overlay
/// snapshot, all in one response.
#[get("/api/view")]
async fn view(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.engine.view().await))
}

/// Switch the active (ticker, range, interval). Responds with the query
/// actually in effect, interval coercion included.
#[post("/api/query")]
async fn set_query(state: web::Data<AppState>, body: web::Json<QueryRequest>) -> Result<HttpResponse> {
    let req = body.into_inner();
    let key = state
        .engine
        .clone()
        .set_query(req.ticker, req.range, req.interval)
        .await?;
    Ok(HttpResponse::Ok().json(key))
}

/// Partial indicator parameter update.
#[post("/api/params")]
async fn set_params(state: web::Data<AppState>, body: web::Json<ParamsPatch>) -> Result<HttpResponse> {
    let updated = state.engine.set_params(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Enable or disable one overlay.
#[post("/api/toggles")]
async fn set_toggle(state: web::Data<AppState>, body: web::Json<ToggleRequest>) -> Result<HttpResponse> {
    let req = body.into_inner();
    let toggles = state.engine.set_toggle(req.overlay, req.enabled).await?;
    Ok(HttpResponse::Ok().json(toggles))
}

/// Price point lookup by series index, for hover/selection readouts.
#[get("/api/price/{index}")]
async fn price_at(state: web::Data<AppState>, path: web::Path<usize>) -> Result<HttpResponse> {
    let index = path.into_inner();
    let point = state
        .engine
        .price_at(index)
        .await
        .ok_or_else(|| AppError::NotFound(format!("no price point at index {}", index)))?;
    Ok(HttpResponse::Ok().json(point))
}

/// MACD crossover summary for the published snapshot.
#[get("/api/analysis")]
async fn analysis(state: web::Data<AppState>) -> Result<HttpResponse> {
    let engine_view = state.engine.view().await;
    let snapshot = engine_view.snapshot.ok_or_else(|| {
        AppError::DataUnavailable("no snapshot published yet".into())
    })?;
    let summary: CrossoverSummary = analyze_crossovers(&engine_view.series, &snapshot);
    Ok(HttpResponse::Ok().json(summary))
}

#[post("/api/trades")]
async fn log_trade(state: web::Data<AppState>, body: web::Json<NewTrade>) -> Result<HttpResponse> {
    let record = state.trades.log(body.into_inner()).await;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Trade logged successfully",
        "trade": record,
    })))
}

#[get("/api/trades")]
async fn trade_log(state: web::Data<AppState>) -> Result<HttpResponse> {
    let entries = state.trades.list().await;
    Ok(HttpResponse::Ok().json(json!({ "trade_log": entries })))
}

#[put("/api/trades/{id}")]
async fn update_trade(
    state: web::Data<AppState>,
    path: web::Path<usize>,
    body: web::Json<TradePatch>,
) -> Result<HttpResponse> {
    let record = state.trades.update(path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Trade updated successfully",
        "trade": record,
    })))
}

#[delete("/api/trades/{id}")]
async fn remove_trade(state: web::Data<AppState>, path: web::Path<usize>) -> Result<HttpResponse> {
    let record = state.trades.remove(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Trade removed",
        "trade": record,
    })))
}

pub async fn start_web(
    engine: Arc<ChartEngine>,
    trades: Arc<TradeLog>,
    host: &str,
    port: u16,
) -> std::io::Result<()> {
    let state = AppState { engine, trades };

    println!("Starting web server at {}:{}", host, port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(view)
            .service(set_query)
            .service(set_params)
            .service(set_toggle)
            .service(price_at)
            .service(analysis)
            .service(log_trade)
            .service(trade_log)
            .service(update_trade)
            .service(remove_trade)
            .service(actix_files::Files::new("/", "./static").index_file("index.html"))
    })
    .bind((host, port))?
    .run()
    .await
}
