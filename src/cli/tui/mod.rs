//! Interactive dashboard for bulk jobs.
//!
//! Shows the aggregate status, the live progress of the current job, and the
//! errors and per-unit results it has reported. A job can be started,
//! cancelled and the status refreshed from the keyboard.

mod app;
mod input;
mod ui;

use std::io::{self, stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::context::AppContext;
use crate::core::models::BulkResource;
use app::TuiApp;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Run the dashboard until the user quits. Any in-flight job is cancelled
/// on exit.
pub async fn run(ctx: AppContext, resource: BulkResource) -> Result<()> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let endpoints = ctx.client.endpoints();
    let title = format!("{}  /api/{}", endpoints.base_url(), endpoints.domain());
    let mut app = TuiApp::new(ctx.runner.clone(), resource, title);
    let result = run_app(&mut terminal, &mut app).await;
    app.shutdown();

    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TuiApp,
) -> Result<()> {
    app.init().await;

    loop {
        app.poll().await;
        terminal.draw(|frame| ui::render(frame, app))?;

        // Input with timeout doubles as the progress poll interval
        if event::poll(POLL_INTERVAL)? {
            let event = event::read()?;
            if let Some(action) = input::handle_event(event) {
                app.handle_action(action).await;
            }
        }

        if !app.running {
            break;
        }
    }

    Ok(())
}
