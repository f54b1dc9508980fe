//! services/dashboard_service.rs
//! Vistas HTML de solo lectura: log de eventos y contenido de una hoja.
//! Un fallo se muestra dentro de la página; nunca se convierte en error HTTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde_json::json;

use crate::{
    models::status_model::SheetHandle,
    services::{event_service::EventService, sheet_client::SheetConnector},
};

const LOGS_TEMPLATE: &str = "logs";
const DASHBOARD_TEMPLATE: &str = "dashboard";

#[derive(Clone)]
pub struct DashboardService {
    templates: Arc<Handlebars<'static>>,
    event_service: EventService,
    connector: Arc<dyn SheetConnector>,
}

impl DashboardService {
    pub fn new(event_service: EventService, connector: Arc<dyn SheetConnector>) -> Result<Self> {
        let mut hb = Handlebars::new();
        hb.set_strict_mode(false);
        hb.register_template_string(LOGS_TEMPLATE, include_str!("../../templates/logs.hbs"))
            .context("Template 'logs' inválido")?;
        hb.register_template_string(
            DASHBOARD_TEMPLATE,
            include_str!("../../templates/dashboard.hbs"),
        )
        .context("Template 'dashboard' inválido")?;

        Ok(Self {
            templates: Arc::new(hb),
            event_service,
            connector,
        })
    }

    pub async fn render_logs(&self, limit: u32) -> String {
        let data = match self.load_logs(limit).await {
            Ok(data) => data,
            Err(e) => {
                log::error!("(render_logs) Error leyendo eventos: {:?}", e);
                json!({ "error": format!("{:#}", e) })
            }
        };
        self.render(LOGS_TEMPLATE, &data)
    }

    async fn load_logs(&self, limit: u32) -> Result<serde_json::Value> {
        let events = self.event_service.list_events(limit).await?;
        let total = self.event_service.count_events().await?;
        Ok(json!({ "events": events, "shown": events.len(), "total": total }))
    }

    pub async fn render_sheet(&self, handle: &SheetHandle) -> String {
        let data = match self.load_sheet(handle).await {
            Ok(rows) => {
                let mut rows = rows.into_iter();
                let header = rows.next().unwrap_or_default();
                json!({
                    "sheet": handle.sheet,
                    "tab": handle.tab,
                    "header": header,
                    "rows": rows.collect::<Vec<_>>(),
                })
            }
            Err(e) => {
                log::error!("(render_sheet) Error leyendo hoja {}: {}", handle, e);
                json!({
                    "sheet": handle.sheet,
                    "tab": handle.tab,
                    "error": e.to_string(),
                })
            }
        };
        self.render(DASHBOARD_TEMPLATE, &data)
    }

    async fn load_sheet(&self, handle: &SheetHandle) -> Result<Vec<Vec<String>>> {
        let sheet = self.connector.open(handle).await?;
        let rows = sheet.read_all_rows().await?;
        if rows.is_empty() {
            anyhow::bail!("la hoja {} está vacía", handle);
        }
        Ok(rows)
    }

    fn render(&self, name: &str, data: &serde_json::Value) -> String {
        match self.templates.render(name, data) {
            Ok(html) => html,
            Err(e) => {
                log::error!("(dashboard) Error renderizando '{}': {}", name, e);
                format!(
                    "<p>Error renderizando {}: {}</p>",
                    name,
                    handlebars::html_escape(&e.to_string())
                )
            }
        }
    }
}
