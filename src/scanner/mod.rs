pub mod scan_loop;
pub mod symbol_scanner;

pub use scan_loop::MarketScanLoop;
pub use symbol_scanner::SymbolScanner;
