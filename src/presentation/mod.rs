//! HTML rendering: askama templates and the view models behind them.

pub mod views;
