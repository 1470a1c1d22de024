//! Output functions for consistent CLI formatting

use super::context::UiContext;
use console::{style, Emoji};

static CHECK: Emoji<'_, '_> = Emoji("✓", "[OK]");
static CROSS: Emoji<'_, '_> = Emoji("✗", "[FAIL]");
static WARN: Emoji<'_, '_> = Emoji("⚠", "[WARN]");
static INFO: Emoji<'_, '_> = Emoji("•", "[INFO]");

fn step(ctx: &UiContext, symbol: &Emoji<'_, '_>, plain: &str, message: &str) {
    if ctx.use_fancy_output() {
        println!("  {} {}", symbol, message);
    } else {
        println!("  {} {}", plain, message);
    }
}

/// Display a section header
pub fn section(_ctx: &UiContext, title: &str) {
    println!();
    println!("{}", style(title).bold());
}

/// Display a success step
pub fn step_ok(ctx: &UiContext, message: &str) {
    step(ctx, &CHECK, "[OK]", message);
}

/// Display a success step with detail
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        println!("  {} {} ({})", style(&CHECK).green(), message, style(detail).dim());
    } else {
        println!("  [OK] {} ({})", message, detail);
    }
}

/// Display a warning step
pub fn step_warn(ctx: &UiContext, message: &str) {
    step(ctx, &WARN, "[WARN]", message);
}

/// Display a warning step with hint
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        println!("  {} {} - {}", style(&WARN).yellow(), message, style(hint).dim());
    } else {
        println!("  [WARN] {} - {}", message, hint);
    }
}

/// Display an error step
pub fn step_error(ctx: &UiContext, message: &str) {
    step(ctx, &CROSS, "[FAIL]", message);
}

/// Display an info step
pub fn step_info(ctx: &UiContext, message: &str) {
    step(ctx, &INFO, "[INFO]", message);
}

/// Print a key-value pair
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}
