// ============================================================================
// Chart - Rendu du graphique en chandeliers japonais
// ============================================================================
// Dessine les canaux du réconciliateur : chandeliers Unicode, panneau
// de volume, lignes d'indicateurs en surimpression et curseur.
//
// ALGORITHME DES CHANDELIERS :
// - Rendu vertical : ligne par ligne de haut en bas
// - Pour chaque ligne, on détermine quel caractère Unicode afficher
// - Logique des 3 zones : mèche supérieure, corps, mèche inférieure
// - Seuils fractionnaires (0.25, 0.75) pour précision sub-caractère
//
// CARACTÈRES UNICODE :
// ┃ Corps plein          │ Mèche pleine
// ╻ Demi-corps (bas)     ╹ Demi-corps (haut)
// ╽ Transition top       ╿ Transition bottom
// ╷ Demi-mèche sup       ╵ Demi-mèche inf
// ============================================================================

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::chart::{CandlePoint, LinePoint};
use crate::format;

// ============================================================================
// Constantes
// ============================================================================

const UNICODE_VOID: char = ' ';
const UNICODE_BODY: char = '┃';
const UNICODE_HALF_BODY_BOTTOM: char = '╻';
const UNICODE_HALF_BODY_TOP: char = '╹';
const UNICODE_WICK: char = '│';
const UNICODE_TOP: char = '╽';
const UNICODE_BOTTOM: char = '╿';
const UNICODE_UPPER_WICK: char = '╷';
const UNICODE_LOWER_WICK: char = '╵';
const UNICODE_VOLUME: char = '█';
const UNICODE_CROSSHAIR: char = '│';

/// Couleurs pour chandeliers haussiers et baissiers
const BULLISH_COLOR: Color = Color::Rgb(52, 208, 88);
const BEARISH_COLOR: Color = Color::Rgb(234, 74, 90);

/// Palette des lignes d'indicateurs, attribuée dans l'ordre des canaux
const INDICATOR_PALETTE: [Color; 6] = [
    Color::Yellow,
    Color::Magenta,
    Color::Cyan,
    Color::LightBlue,
    Color::LightRed,
    Color::White,
];

/// Largeur de l'axe Y (pour les prix)
const Y_AXIS_WIDTH: u16 = 12;

/// Design réactif : axe Y réduit sur terminaux étroits
const MIN_TERMINAL_WIDTH: u16 = 60;
const ADAPTIVE_Y_AXIS_THRESHOLD: u16 = 80;
const NARROW_Y_AXIS_WIDTH: u16 = 8;

/// Hauteur du panneau de volume
const VOLUME_PANE_HEIGHT: u16 = 5;

// ============================================================================
// Cellules du rendu
// ============================================================================

/// Une cellule de la grille de rendu
#[derive(Debug, Clone, Copy)]
struct Cell {
    ch: char,
    color: Color,
}

impl Cell {
    fn void() -> Self {
        Self {
            ch: UNICODE_VOID,
            color: Color::Reset,
        }
    }

    fn is_void(&self) -> bool {
        self.ch == UNICODE_VOID
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Renderer des canaux du graphique en mode texte
struct ChannelRenderer<'a> {
    app: &'a App,
    candles: &'a [CandlePoint],
    /// Fenêtre visible : [start, start + width) dans les chandelles
    start: usize,
    width: usize,
    price_height: u16,
    y_axis_width: u16,
    min_price: f64,
    max_price: f64,
}

impl<'a> ChannelRenderer<'a> {
    fn new(app: &'a App, candles: &'a [CandlePoint], inner: Rect) -> Self {
        let y_axis_width = if inner.width < ADAPTIVE_Y_AXIS_THRESHOLD {
            NARROW_Y_AXIS_WIDTH
        } else {
            Y_AXIS_WIDTH
        };
        let width = inner.width.saturating_sub(y_axis_width) as usize;
        // Légende + volume + 2 lignes d'axe X + readout du curseur
        let price_height = inner.height.saturating_sub(VOLUME_PANE_HEIGHT + 4).max(4);

        let start = Self::window_start(candles.len(), width, app.crosshair_index());
        let window = &candles[start..(start + width.min(candles.len() - start))];
        let (min_price, max_price) = Self::price_bounds(app, window);

        Self {
            app,
            candles,
            start,
            width,
            price_height,
            y_axis_width,
            min_price,
            max_price,
        }
    }

    /// Début de la fenêtre visible : les dernières chandelles qui
    /// tiennent à l'écran, décalée si besoin pour garder le curseur
    /// visible
    fn window_start(len: usize, width: usize, crosshair: Option<usize>) -> usize {
        if width == 0 || len <= width {
            return 0;
        }
        let default_start = len - width;
        match crosshair {
            Some(index) if index < default_start => index,
            _ => default_start,
        }
    }

    fn window(&self) -> &'a [CandlePoint] {
        let end = (self.start + self.width).min(self.candles.len());
        &self.candles[self.start..end]
    }

    /// Bornes de prix de la fenêtre, lignes d'indicateurs comprises
    fn price_bounds(app: &App, window: &[CandlePoint]) -> (f64, f64) {
        let mut max_price = window.iter().fold(f64::NEG_INFINITY, |m, c| m.max(c.high));
        let mut min_price = window.iter().fold(f64::INFINITY, |m, c| m.min(c.low));

        let first_time = window.first().map(|c| c.time).unwrap_or(0);
        let last_time = window.last().map(|c| c.time).unwrap_or(0);
        for (_, points) in app.channels.lines() {
            for point in points {
                if point.time >= first_time && point.time <= last_time {
                    max_price = max_price.max(point.value);
                    min_price = min_price.min(point.value);
                }
            }
        }

        // Marge de 2% pour que le graphique respire
        let margin = (max_price - min_price) * 0.02;
        ((min_price - margin).max(0.0), max_price + margin)
    }

    /// Convertit un prix en coordonnée de hauteur
    fn price_to_height(&self, price: f64) -> f64 {
        if self.max_price == self.min_price {
            return self.price_height as f64 / 2.0;
        }
        (price - self.min_price) / (self.max_price - self.min_price) * self.price_height as f64
    }

    fn candle_color(candle: &CandlePoint) -> Color {
        if candle.close >= candle.open {
            BULLISH_COLOR
        } else {
            BEARISH_COLOR
        }
    }

    /// Caractère d'un chandelier à une hauteur donnée (cœur de
    /// l'algorithme, zones mèche/corps/mèche)
    fn render_candle(&self, candle: &CandlePoint, y: u16) -> char {
        let height_unit = y as f64;

        let high_y = self.price_to_height(candle.high);
        let low_y = self.price_to_height(candle.low);
        let max_y = self.price_to_height(candle.open.max(candle.close));
        let min_y = self.price_to_height(candle.close.min(candle.open));

        let mut output = UNICODE_VOID;

        // Zone 1 : mèche supérieure (high → haut du corps)
        if high_y.ceil() >= height_unit && height_unit >= max_y.floor() {
            if max_y - height_unit > 0.75 {
                output = UNICODE_BODY;
            } else if (max_y - height_unit) > 0.25 {
                if (high_y - height_unit) > 0.75 {
                    output = UNICODE_TOP;
                } else {
                    output = UNICODE_HALF_BODY_BOTTOM;
                }
            } else if (high_y - height_unit) > 0.75 {
                output = UNICODE_WICK;
            } else if (high_y - height_unit) > 0.25 {
                output = UNICODE_UPPER_WICK;
            }
        }
        // Zone 2 : corps
        else if max_y.floor() >= height_unit && height_unit >= min_y.ceil() {
            output = UNICODE_BODY;
        }
        // Zone 3 : mèche inférieure (bas du corps → low)
        else if min_y.ceil() >= height_unit && height_unit >= low_y.floor() {
            if (min_y - height_unit) < 0.25 {
                output = UNICODE_BODY;
            } else if (min_y - height_unit) < 0.75 {
                if (low_y - height_unit) < 0.25 {
                    output = UNICODE_BOTTOM;
                } else {
                    output = UNICODE_HALF_BODY_TOP;
                }
            } else if low_y - height_unit < 0.25 {
                output = UNICODE_WICK;
            } else if low_y - height_unit < 0.75 {
                output = UNICODE_LOWER_WICK;
            }
        }

        output
    }

    /// Libellé de l'axe Y pour une ligne donnée (prix toutes les 4 lignes)
    fn y_axis_label(&self, y: u16) -> String {
        let width = self.y_axis_width as usize - 3;
        if y % 4 == 0 {
            let price = self.min_price
                + (y as f64 * (self.max_price - self.min_price) / self.price_height as f64);
            format!("{:>w$.2} │ ", price, w = width)
        } else {
            format!("{:>w$} │ ", "", w = width)
        }
    }

    // ========================================================================
    // Grille de prix : chandeliers + surimpressions
    // ========================================================================

    /// Construit la grille du panneau de prix
    ///
    /// Ordre de dessin : chandeliers d'abord, puis lignes d'indicateurs
    /// dans les cellules vides, puis la colonne du curseur.
    fn price_grid(&self) -> Vec<Vec<Cell>> {
        let window = self.window();
        let height = self.price_height as usize;
        let mut grid = vec![vec![Cell::void(); self.width]; height];

        // Chandeliers : une colonne par chandelle
        for (column, candle) in window.iter().enumerate() {
            let color = Self::candle_color(candle);
            for y in 1..=self.price_height {
                let ch = self.render_candle(candle, y);
                if ch != UNICODE_VOID {
                    // Ligne 0 de la grille = haut du panneau
                    let row = (self.price_height - y) as usize;
                    grid[row][column] = Cell { ch, color };
                }
            }
        }

        // Lignes d'indicateurs : un point par colonne où la valeur existe
        for (index, (_, points)) in self.app.channels.lines().enumerate() {
            let color = INDICATOR_PALETTE[index % INDICATOR_PALETTE.len()];
            for (column, candle) in window.iter().enumerate() {
                let Some(value) = line_value_at(points, candle.time) else {
                    continue;
                };
                let y = self.price_to_height(value).round();
                if y < 1.0 || y > self.price_height as f64 {
                    continue;
                }
                let row = (self.price_height - y as u16) as usize;
                if grid[row][column].is_void() {
                    grid[row][column] = Cell { ch: '•', color };
                }
            }
        }

        // Colonne du curseur dans les cellules encore vides
        if let Some(index) = self.app.crosshair_index() {
            if index >= self.start {
                let column = index - self.start;
                if column < self.width {
                    for row in grid.iter_mut() {
                        if row[column].is_void() {
                            row[column] = Cell {
                                ch: UNICODE_CROSSHAIR,
                                color: Color::DarkGray,
                            };
                        }
                    }
                }
            }
        }

        grid
    }

    /// Lignes stylées du panneau de prix, axe Y compris
    fn price_lines(&self) -> Vec<Line<'static>> {
        let grid = self.price_grid();
        let mut lines = Vec::with_capacity(grid.len());
        for (row_index, row) in grid.iter().enumerate() {
            let y = self.price_height - row_index as u16;
            let mut spans = vec![Span::styled(
                self.y_axis_label(y),
                Style::default().fg(Color::Gray),
            )];
            spans.extend(row.iter().map(|cell| {
                Span::styled(cell.ch.to_string(), Style::default().fg(cell.color))
            }));
            lines.push(Line::from(spans));
        }
        lines
    }

    // ========================================================================
    // Panneau de volume
    // ========================================================================

    fn volume_lines(&self) -> Vec<Line<'static>> {
        let window = self.window();
        let volume = self.app.channels.volume().unwrap_or(&[]);
        let columns: Vec<(f64, Color)> = (0..window.len())
            .map(|column| {
                let point = volume.get(self.start + column);
                let value = point.map(|p| p.value).unwrap_or(0.0);
                let color = match point {
                    Some(p) if p.bullish => BULLISH_COLOR,
                    Some(_) => BEARISH_COLOR,
                    None => Color::DarkGray,
                };
                (value, color)
            })
            .collect();

        let max_volume = columns.iter().fold(0.0_f64, |m, (v, _)| m.max(*v));
        let mut lines = Vec::with_capacity(VOLUME_PANE_HEIGHT as usize);
        for y in (1..=VOLUME_PANE_HEIGHT).rev() {
            let mut spans = vec![Span::styled(
                format!("{:>w$} │ ", if y == VOLUME_PANE_HEIGHT { "vol" } else { "" },
                    w = self.y_axis_width as usize - 3),
                Style::default().fg(Color::Gray),
            )];
            for (value, color) in &columns {
                let bar_height = if max_volume > 0.0 {
                    value / max_volume * VOLUME_PANE_HEIGHT as f64
                } else {
                    0.0
                };
                let ch = if bar_height >= y as f64 - 0.5 {
                    UNICODE_VOLUME
                } else {
                    UNICODE_VOID
                };
                spans.push(Span::styled(ch.to_string(), Style::default().fg(*color)));
            }
            lines.push(Line::from(spans));
        }
        lines
    }

    // ========================================================================
    // Axe X
    // ========================================================================

    /// Deux lignes d'axe X : tick marks et dates "DD/MM"
    fn x_axis_lines(&self) -> Vec<Line<'static>> {
        let window = self.window();
        let pad = " ".repeat(self.y_axis_width as usize);

        // "DD/MM" = 5 caractères, +2 d'espacement minimum
        let max_labels = (self.width / 7).clamp(2, 10);
        let label_interval = if window.len() <= max_labels {
            1
        } else {
            window.len() / max_labels
        }
        .max(1);

        let mut ticks = String::new();
        let mut labels = String::new();
        for (i, candle) in window.iter().enumerate() {
            if i % label_interval == 0 {
                ticks.push('│');
                let label = format::to_naive_date(candle.time)
                    .map(|d| d.format("%d/%m").to_string())
                    .unwrap_or_else(|| "??/??".to_string());
                // N'écrit le label que si la place le permet
                if labels.len() <= i {
                    while labels.len() < i {
                        labels.push(' ');
                    }
                    labels.push_str(&label);
                }
            } else {
                ticks.push(' ');
            }
        }

        vec![
            Line::from(vec![
                Span::raw(pad.clone()),
                Span::styled(ticks, Style::default().fg(Color::Gray)),
            ]),
            Line::from(vec![
                Span::raw(pad),
                Span::styled(labels, Style::default().fg(Color::Gray)),
            ]),
        ]
    }

    // ========================================================================
    // Légende et readout
    // ========================================================================

    /// Légende des lignes d'indicateurs tracées
    fn legend_line(&self) -> Line<'static> {
        let mut spans = vec![Span::raw(" ".repeat(self.y_axis_width as usize))];
        for (index, (id, _)) in self.app.channels.lines().enumerate() {
            let color = INDICATOR_PALETTE[index % INDICATOR_PALETTE.len()];
            spans.push(Span::styled("• ".to_string(), Style::default().fg(color)));
            spans.push(Span::styled(
                format!("{}  ", id),
                Style::default().fg(color),
            ));
        }
        Line::from(spans)
    }

    /// Valeurs sous le curseur, cachées quand il est hors données
    fn readout_line(&self) -> Line<'static> {
        let Some(readout) = self.app.crosshair_readout() else {
            return Line::from("");
        };
        let date = format::to_date_key(readout.time).unwrap_or_else(|| "?".to_string());
        let volume = match readout.volume {
            Some(v) => format_volume(v),
            None => "-".to_string(),
        };
        Line::from(vec![
            Span::raw(" ".repeat(self.y_axis_width as usize)),
            Span::styled(
                format!("┼ {}  close {:.2}  volume {}", date, readout.close, volume),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ])
    }

    /// Toutes les lignes du graphique, de haut en bas
    fn render_lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![self.legend_line()];
        lines.extend(self.price_lines());
        lines.extend(self.volume_lines());
        lines.extend(self.x_axis_lines());
        lines.push(self.readout_line());
        lines
    }
}

/// Valeur d'une ligne d'indicateur au temps exact d'une chandelle
fn line_value_at(points: &[LinePoint], time: i64) -> Option<f64> {
    let index = points.binary_search_by_key(&time, |p| p.time).ok()?;
    Some(points[index].value)
}

/// Formate un volume avec des suffixes lisibles (1.2M, 450.0K)
fn format_volume(value: f64) -> String {
    if value >= 1_000_000_000.0 {
        format!("{:.1}B", value / 1_000_000_000.0)
    } else if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else {
        format!("{:.0}", value)
    }
}

// ============================================================================
// Fonction principale de rendu
// ============================================================================

/// Dessine le graphique du titre sélectionné
pub fn render_chart(frame: &mut Frame, app: &App, area: Rect) {
    if area.width < MIN_TERMINAL_WIDTH {
        render_too_narrow(frame, area);
        return;
    }

    let candle_count = app.channels.candles().map(|c| c.len()).unwrap_or(0);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(format!(
            " {} - {} ({} chandeliers) ",
            app.chart_title(),
            app.interval.label(),
            candle_count,
        ));

    let candles = match app.channels.candles() {
        Some(candles) if !candles.is_empty() => candles,
        _ => {
            render_placeholder(frame, app, area, block);
            return;
        }
    };

    let inner = block.inner(area);
    let renderer = ChannelRenderer::new(app, candles, inner);
    let paragraph = Paragraph::new(renderer.render_lines()).block(block);
    frame.render_widget(paragraph, area);
}

/// Affiche l'état vide : chargement en cours ou absence de données
fn render_placeholder(frame: &mut Frame, app: &App, area: Rect, block: Block) {
    let message = if app.is_loading_data() {
        app.loading_message
            .clone()
            .unwrap_or_else(|| "Chargement...".to_string())
    } else if let Some(error) = app.error() {
        error.to_string()
    } else {
        "Aucune donnée à afficher".to_string()
    };

    let color = if app.error().is_some() && !app.is_loading_data() {
        Color::Red
    } else {
        Color::Gray
    };

    let text = vec![
        Line::from(""),
        Line::from(Span::styled(message, Style::default().fg(color))),
    ];
    let paragraph = Paragraph::new(text).block(block).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

/// Affiche un message quand le terminal est trop étroit
fn render_too_narrow(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" ⚠ Terminal trop petit ");

    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Terminal trop étroit pour afficher le graphique",
            Style::default().fg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("Largeur minimale requise : {} colonnes", MIN_TERMINAL_WIDTH),
            Style::default().fg(Color::Gray),
        )),
    ];

    let paragraph = Paragraph::new(text).block(block).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}
