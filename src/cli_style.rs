use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Color as CtColor, Stylize};
use unicode_width::UnicodeWidthStr;

pub fn get_styles() -> Styles {
    let accent = |color: AnsiColor| Style::new().bold().fg_color(Some(Color::Ansi(color)));
    Styles::styled()
        .usage(accent(AnsiColor::Yellow).underline())
        .header(accent(AnsiColor::Yellow).underline())
        .literal(accent(AnsiColor::Green))
        .invalid(accent(AnsiColor::Red))
        .error(accent(AnsiColor::Red))
        .valid(accent(AnsiColor::Green))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

mod colors {
    use crossterm::style::Color;

    pub const AMBER: Color = Color::Rgb {
        r: 255,
        g: 191,
        b: 0,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 80,
        g: 220,
        b: 100,
    };
    pub const RED: Color = Color::Rgb {
        r: 240,
        g: 80,
        b: 80,
    };
    pub const BLUE: Color = Color::Rgb {
        r: 100,
        g: 160,
        b: 255,
    };
    pub const DIM: Color = Color::Rgb {
        r: 120,
        g: 120,
        b: 120,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 235,
        g: 235,
        b: 235,
    };
}

const SECTION_WIDTH: usize = 56;

fn print_status(glyph: &str, color: CtColor, message: &str) {
    println!(" {} {}", glyph.with(color).bold(), message.with(color));
}

pub fn print_success(message: &str) {
    print_status("✓", colors::GREEN, message);
}

pub fn print_error(message: &str) {
    print_status("✗", colors::RED, message);
}

pub fn print_warning(message: &str) {
    print_status("!", colors::AMBER, message);
}

pub fn print_info(message: &str) {
    print_status("i", colors::BLUE, message);
}

pub fn print_section_header(title: &str) {
    let fill = SECTION_WIDTH.saturating_sub(title.width() + 3);
    println!();
    println!(
        "{} {} {}",
        "──".with(colors::AMBER),
        title.with(colors::AMBER).bold(),
        "─".repeat(fill).with(colors::AMBER)
    );
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {}",
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

pub fn print_list_item(item: &str) {
    println!("  {} {}", "•".with(colors::AMBER), item.with(colors::WHITE));
}

pub fn print_empty_list(message: &str) {
    println!("  {}", message.with(colors::DIM).italic());
}

/// Boxed table sized to its widest cells.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    widths: Vec<usize>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            widths: headers.iter().map(|h| h.width()).collect(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (width, cell) in self.widths.iter_mut().zip(&row) {
            *width = (*width).max(cell.width());
        }
        self.rows.push(row);
    }

    fn border(&self, left: &str, joint: &str, right: &str) {
        let segments: Vec<String> = self.widths.iter().map(|w| "─".repeat(w + 2)).collect();
        println!(
            "{}",
            format!("{}{}{}", left, segments.join(joint), right).with(colors::DIM)
        );
    }

    fn line(&self, cells: &[String], header: bool) {
        let mut out = String::new();
        for (cell, width) in cells.iter().zip(&self.widths) {
            let padding = " ".repeat(width.saturating_sub(cell.width()));
            let text = if header {
                cell.as_str().with(colors::AMBER).bold().to_string()
            } else {
                cell.as_str().with(colors::WHITE).to_string()
            };
            out.push_str(&format!("{} {}{} ", "│".with(colors::DIM), text, padding));
        }
        println!("{}{}", out, "│".with(colors::DIM));
    }

    pub fn print(&self) {
        self.border("┌", "┬", "┐");
        self.line(&self.headers, true);
        self.border("├", "┼", "┤");
        for row in &self.rows {
            self.line(row, false);
        }
        self.border("└", "┴", "┘");
    }
}
