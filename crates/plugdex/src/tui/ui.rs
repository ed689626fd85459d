//! UI rendering for the TUI.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};

use plugdex_protocol::PluginDetail;

use super::app::{App, Mode, SubmitField};
use crate::prefs::InstallTab;

/// Truncate a line to fit, with a trailing ellipsis.
fn truncate(text: &str, max_width: usize) -> String {
    if text.chars().count() <= max_width {
        return text.to_string();
    }
    if max_width <= 1 {
        return text.chars().take(max_width).collect();
    }
    let head: String = text.chars().take(max_width - 1).collect();
    format!("{}…", head)
}

fn format_stars(stars: Option<u64>) -> String {
    match stars {
        Some(stars) if stars >= 1000 => format!("★{:.1}k", stars as f64 / 1000.0),
        Some(stars) => format!("★{}", stars),
        None => String::new(),
    }
}

/// Draw the entire UI.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();
    match app.mode {
        Mode::Browse => draw_browse_screen(frame, app, area),
        Mode::Detail => draw_detail_screen(frame, app, area),
        Mode::Submit => draw_submit_screen(frame, app, area),
    }
}

fn draw_browse_screen(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Search bar
            Constraint::Min(0),    // Result list
            Constraint::Length(2), // Status / key hints
        ])
        .split(area);

    draw_search_bar(frame, app, chunks[0]);
    draw_result_list(frame, app, chunks[1]);
    draw_browse_footer(frame, app, chunks[2]);
}

fn draw_search_bar(frame: &mut Frame, app: &App, area: Rect) {
    let style = if app.search_focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let title = if app.search_focused {
        " Search (Enter/Esc to leave) "
    } else {
        " Search (/) "
    };
    let bar = Paragraph::new(app.search_input.as_str()).style(style).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(style)
            .title(title),
    );
    frame.render_widget(bar, area);
    if app.search_focused {
        let cursor_x = area.x + 1 + app.search_input.chars().count() as u16;
        frame.set_cursor_position((cursor_x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn draw_result_list(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = match app.controller.page() {
        Some(page) if !page.plugins.is_empty() => page
            .plugins
            .iter()
            .map(|plugin| {
                let visited = app.prefs.is_visited(&plugin.slug);
                let marker = if visited { "· " } else { "  " };
                let stars = format_stars(plugin.github_stars);
                let desc = plugin.short_desc.as_deref().unwrap_or("");
                let mut spans = vec![
                    Span::styled(marker, Style::default().fg(Color::DarkGray)),
                    Span::styled(
                        plugin.name.clone(),
                        if visited {
                            Style::default().fg(Color::DarkGray)
                        } else {
                            Style::default().add_modifier(Modifier::BOLD)
                        },
                    ),
                ];
                if !stars.is_empty() {
                    spans.push(Span::styled(
                        format!(" {}", stars),
                        Style::default().fg(Color::Yellow),
                    ));
                }
                if !desc.is_empty() {
                    let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
                    spans.push(Span::styled(
                        format!("  {}", truncate(desc, width.saturating_sub(used + 2))),
                        Style::default().fg(Color::Gray),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect(),
        Some(_) => vec![ListItem::new(Line::from(Span::styled(
            "no plugins match this search",
            Style::default().fg(Color::DarkGray),
        )))],
        None => vec![ListItem::new(Line::from(Span::styled(
            if app.controller.is_loading() {
                "loading…"
            } else {
                "no results yet"
            },
            Style::default().fg(Color::DarkGray),
        )))],
    };

    let title = match app.controller.page() {
        Some(page) => format!(
            " Plugins — page {} of {} ({} results){} ",
            page.current_page,
            page.total_pages,
            page.total_results,
            if app.controller.is_loading() {
                " · loading…"
            } else {
                ""
            }
        ),
        None => " Plugins ".to_string(),
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.controller.selection().index());
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_browse_footer(frame: &mut Frame, app: &App, area: Rect) {
    let status = if let Some(err) = app.controller.error() {
        Line::from(Span::styled(
            format!("error: {}", err),
            Style::default().fg(Color::Red),
        ))
    } else if let Some(status) = &app.status {
        Line::from(Span::styled(
            status.clone(),
            Style::default().fg(Color::Cyan),
        ))
    } else {
        Line::from("")
    };
    let hints = Line::from(Span::styled(
        "j/k move · Enter open · n/p page · / search · s submit · r refresh · q quit",
        Style::default().fg(Color::DarkGray),
    ));
    let footer = Paragraph::new(vec![status, hints]);
    frame.render_widget(footer, area);
}

fn draw_detail_screen(frame: &mut Frame, app: &App, area: Rect) {
    let Some(view) = &app.detail else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Name, category, tags
            Constraint::Length(4), // Install instructions
            Constraint::Min(0),    // Readme
            Constraint::Length(2), // Footer
        ])
        .split(area);

    let header_lines = match &view.detail {
        Some(detail) => {
            let mut lines = vec![Line::from(Span::styled(
                detail.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ))];
            let category = detail.category.as_deref().unwrap_or("uncategorized");
            let tags = if let Some(buffer) = &view.editing_tags {
                format!("tags (editing): {}", buffer)
            } else if detail.tags.is_empty() {
                "tags: none (t to edit)".to_string()
            } else {
                format!("tags: {}", detail.tags.join(", "))
            };
            lines.push(Line::from(format!("category: {} (c to cycle)", category)));
            lines.push(Line::from(tags));
            lines
        }
        None => {
            let text = match &view.error {
                Some(err) => format!("failed to load {}: {}", view.slug, err),
                None => format!("loading {}…", view.slug),
            };
            vec![Line::from(text)]
        }
    };
    frame.render_widget(
        Paragraph::new(header_lines).block(Block::default().borders(Borders::ALL)),
        chunks[0],
    );

    draw_install_box(frame, app, view.detail.as_ref(), chunks[1]);

    let body = view
        .detail
        .as_ref()
        .and_then(|d| d.long_description())
        .unwrap_or("");
    frame.render_widget(
        Paragraph::new(body)
            .wrap(Wrap { trim: false })
            .scroll((view.scroll, 0))
            .block(Block::default().borders(Borders::ALL).title(" Readme ")),
        chunks[2],
    );

    let hints = Line::from(Span::styled(
        "1-4 install tab · t tags · c category · n/p next/prev · j/k scroll · Esc back",
        Style::default().fg(Color::DarkGray),
    ));
    let status = match &app.status {
        Some(status) => Line::from(Span::styled(
            status.clone(),
            Style::default().fg(Color::Cyan),
        )),
        None => Line::from(""),
    };
    frame.render_widget(Paragraph::new(vec![status, hints]), chunks[3]);
}

fn draw_install_box(frame: &mut Frame, app: &App, detail: Option<&PluginDetail>, area: Rect) {
    let selected = InstallTab::ALL
        .iter()
        .position(|tab| *tab == app.prefs.install_tab)
        .unwrap_or(0);
    let titles: Vec<Line> = InstallTab::ALL
        .iter()
        .map(|tab| Line::from(tab.label()))
        .collect();
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(3)])
        .split(area);
    frame.render_widget(tabs, chunks[0]);

    let command = detail
        .map(|d| install_command(app.prefs.install_tab, d))
        .unwrap_or_default();
    frame.render_widget(
        Paragraph::new(command).block(Block::default().borders(Borders::ALL).title(" Install ")),
        chunks[1],
    );
}

/// The one-liner for the selected plugin manager.
fn install_command(tab: InstallTab, detail: &PluginDetail) -> String {
    let Some(path) = detail.short_github_path() else {
        return match &detail.vimorg_id {
            Some(id) => format!("see https://www.vim.org/scripts/script.php?script_id={}", id),
            None => "no install source known".to_string(),
        };
    };
    match tab {
        InstallTab::Vundle => format!("Plugin '{}'", path),
        InstallTab::NeoBundle => format!("NeoBundle '{}'", path),
        InstallTab::VimPlug => format!("Plug '{}'", path),
        InstallTab::Pathogen => {
            let repo = path.rsplit('/').next().unwrap_or(&path);
            format!(
                "cd ~/.vim/bundle && git clone https://github.com/{} {}",
                path, repo
            )
        }
    }
}

fn draw_submit_screen(frame: &mut Frame, app: &App, area: Rect) {
    let Some(view) = &app.submit else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Name
            Constraint::Length(3), // GitHub URL
            Constraint::Length(3), // Tags
            Constraint::Length(2), // Status
            Constraint::Min(0),
        ])
        .split(area);

    let fields = [
        (SubmitField::Name, " Name ", view.name.as_str()),
        (SubmitField::GithubUrl, " GitHub URL ", view.github_url.as_str()),
        (SubmitField::Tags, " Tags (comma separated) ", view.tags.as_str()),
    ];
    for ((field, title, value), chunk) in fields.iter().zip(chunks.iter()) {
        let style = if view.focus == *field {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        frame.render_widget(
            Paragraph::new(*value).style(style).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(style)
                    .title(*title),
            ),
            *chunk,
        );
    }

    let status = match &view.status {
        Some(status) => Line::from(Span::styled(
            status.clone(),
            Style::default().fg(Color::Cyan),
        )),
        None => Line::from(Span::styled(
            "Tab next field · Enter submit · Esc back",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(status), chunks[3]);
}
