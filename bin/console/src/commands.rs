//! Console commands.

use registrar_core::RecordId;
use registrar_listing::{
    ForeignKey, ListController, ListError, ListQuery, Resource, RestListSource,
    RestReferenceLookup, SortDirection,
};
use registrar_session::{GuardDecision, Navigator, Redirect, Route, SessionState};
use registrar_transport::{Transport, TransportError};
use serde_json::Value as JsonValue;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RouteConfig;
use crate::error::ConsoleError;

/// Parameters of the `list` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub resource: Resource,
    /// One-based page number.
    pub page: usize,
    pub size: usize,
    pub sort: Option<String>,
    pub descending: bool,
    pub keyword: Option<String>,
}

impl ListRequest {
    /// First page of `resource` with default paging.
    #[must_use]
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            page: 1,
            size: registrar_listing::query::DEFAULT_PAGE_SIZE,
            sort: None,
            descending: false,
            keyword: None,
        }
    }

    fn query(&self) -> ListQuery {
        let direction = if self.descending {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        let sort = self
            .sort
            .clone()
            .unwrap_or_else(|| registrar_listing::query::DEFAULT_SORT_FIELD.to_string());
        ListQuery::default()
            .with_page_size(self.size)
            .with_sort(sort, direction)
            .with_keyword(self.keyword.clone().unwrap_or_default())
            .with_page(self.page.saturating_sub(1))
    }
}

/// Runs commands against one transport and session.
#[derive(Debug)]
pub struct Console {
    transport: Transport,
    navigator: Navigator,
}

impl Console {
    #[must_use]
    pub fn new(transport: Transport, routes: &RouteConfig) -> Self {
        let navigator = Navigator::new(
            transport.session().clone(),
            routes.login.clone(),
            routes.default.clone(),
        );
        Self {
            transport,
            navigator,
        }
    }

    pub async fn login<W: Write>(
        &self,
        username: &str,
        password: &str,
        out: &mut W,
    ) -> Result<(), ConsoleError> {
        let session = self
            .transport
            .login(username, password)
            .await
            .map_err(|e| ConsoleError::Login {
                details: e.to_string(),
            })?;
        info!(username = %session.user().username, "signed in");
        writeln!(
            out,
            "signed in as {} ({})",
            session.user().username,
            session.user().role
        )
        .map_err(output_error)
    }

    pub async fn logout<W: Write>(&self, out: &mut W) -> Result<(), ConsoleError> {
        self.transport.logout().await;
        writeln!(out, "signed out").map_err(output_error)
    }

    pub fn whoami<W: Write>(&self, out: &mut W) -> Result<(), ConsoleError> {
        match self.transport.session().current() {
            SessionState::Authenticated(session) => writeln!(
                out,
                "{} ({})",
                session.user().username,
                session.user().role
            )
            .map_err(output_error),
            _ => Err(ConsoleError::NotSignedIn),
        }
    }

    /// Prints one page of `request.resource` as JSON lines, with a
    /// `…Name` field added for every resolved foreign key.
    pub async fn list<W: Write>(
        &mut self,
        request: &ListRequest,
        out: &mut W,
    ) -> Result<(), ConsoleError> {
        let resource = request.resource;
        let route = if resource.admin_only() {
            Route::admin_only(resource.path())
        } else {
            Route::authenticated(resource.path())
        };
        match self.navigator.navigate(route) {
            GuardDecision::Render => {}
            GuardDecision::RedirectToDefault => {
                debug!(to = self.navigator.target(Redirect::ToDefault), "role too low");
                return Err(ConsoleError::AdminRequired {
                    resource: resource.to_string(),
                });
            }
            GuardDecision::RedirectToLogin | GuardDecision::Loading => {
                debug!(to = self.navigator.target(Redirect::ToLogin), "not signed in");
                return Err(ConsoleError::NotSignedIn);
            }
        }

        let mut redirects = self.transport.redirects();
        let keys = resource.foreign_keys();
        let source = RestListSource::<JsonValue>::for_resource(self.transport.clone(), resource);
        let mut controller = ListController::new(Arc::new(source), request.query());
        for key in keys {
            let lookup = RestReferenceLookup::for_resource(self.transport.clone(), key.target);
            let column = key.column;
            controller = controller
                .with_reference(Arc::new(lookup), move |row: &JsonValue| row_id(row, column));
        }

        let page = match controller.refresh().await {
            Ok(page) => page,
            Err(ListError::Transport(TransportError::Unauthorized { .. }))
                if redirects.try_recv().is_ok() =>
            {
                warn!(
                    to = self.navigator.target(Redirect::ToLogin),
                    "session ended by the server"
                );
                return Err(ConsoleError::NotSignedIn);
            }
            Err(e) => {
                return Err(ConsoleError::List {
                    details: e.to_string(),
                });
            }
        };

        for mut row in page.content {
            annotate(&mut row, keys, &controller);
            let line = serde_json::to_string(&row).map_err(|e| ConsoleError::Output {
                details: e.to_string(),
            })?;
            writeln!(out, "{line}").map_err(output_error)?;
        }
        writeln!(
            out,
            "page {} of {}",
            page.page_index + 1,
            page.total_pages.max(1)
        )
        .map_err(output_error)
    }
}

fn output_error(e: std::io::Error) -> ConsoleError {
    ConsoleError::Output {
        details: e.to_string(),
    }
}

/// Reads a foreign key, which some endpoints send as a numeric string.
fn row_id(row: &JsonValue, column: &str) -> Option<RecordId> {
    match row.get(column)? {
        JsonValue::Number(n) => n.as_i64().map(RecordId::new),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// `academyId` is shown as `academyName`.
fn name_column(column: &str) -> String {
    format!("{}Name", column.strip_suffix("Id").unwrap_or(column))
}

fn annotate(row: &mut JsonValue, keys: &[ForeignKey], controller: &ListController<JsonValue>) {
    for (index, key) in keys.iter().enumerate() {
        let Some(resolver) = controller.reference(index) else {
            continue;
        };
        let Some(id) = row_id(row, key.column) else {
            continue;
        };
        if let Some(fields) = row.as_object_mut() {
            fields.insert(
                name_column(key.column),
                JsonValue::String(resolver.display(id)),
            );
        }
    }
}
