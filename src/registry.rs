//! Static symbol universes: the crypto asset registry (ticker → price symbol
//! and market-data id) and the default NASDAQ screening list.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoAsset {
    /// Display ticker, e.g. `BTC`.
    pub ticker: &'static str,
    /// Symbol used by the price-history provider, e.g. `BTC-USD`.
    pub price_symbol: &'static str,
    /// Identifier used by the market-data aggregation provider.
    pub provider_id: &'static str,
    pub name: &'static str,
}

const fn asset(
    ticker: &'static str,
    price_symbol: &'static str,
    provider_id: &'static str,
    name: &'static str,
) -> CryptoAsset {
    CryptoAsset {
        ticker,
        price_symbol,
        provider_id,
        name,
    }
}

pub const CRYPTO_ASSETS: [CryptoAsset; 20] = [
    asset("BTC", "BTC-USD", "bitcoin", "Bitcoin"),
    asset("ETH", "ETH-USD", "ethereum", "Ethereum"),
    asset("BNB", "BNB-USD", "binancecoin", "Binance Coin"),
    asset("ADA", "ADA-USD", "cardano", "Cardano"),
    asset("XRP", "XRP-USD", "ripple", "Ripple"),
    asset("SOL", "SOL-USD", "solana", "Solana"),
    asset("DOT", "DOT-USD", "polkadot", "Polkadot"),
    asset("DOGE", "DOGE-USD", "dogecoin", "Dogecoin"),
    asset("AVAX", "AVAX-USD", "avalanche-2", "Avalanche"),
    asset("LTC", "LTC-USD", "litecoin", "Litecoin"),
    asset("LINK", "LINK-USD", "chainlink", "Chainlink"),
    asset("MATIC", "MATIC-USD", "matic-network", "Polygon"),
    asset("ALGO", "ALGO-USD", "algorand", "Algorand"),
    asset("VET", "VET-USD", "vechain", "VeChain"),
    asset("ICP", "ICP-USD", "internet-computer", "Internet Computer"),
    asset("FIL", "FIL-USD", "filecoin", "Filecoin"),
    asset("TRX", "TRX-USD", "tron", "TRON"),
    asset("ETC", "ETC-USD", "ethereum-classic", "Ethereum Classic"),
    asset("XLM", "XLM-USD", "stellar", "Stellar"),
    asset("THETA", "THETA-USD", "theta-token", "Theta Network"),
];

pub fn crypto_asset(ticker: &str) -> Option<&'static CryptoAsset> {
    let ticker = ticker.trim();
    CRYPTO_ASSETS
        .iter()
        .find(|a| a.ticker.eq_ignore_ascii_case(ticker))
}

const NASDAQ_SYMBOLS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "NVDA", "META", "NFLX", "BABA", "ORCL",
    "ADBE", "CRM", "INTC", "AMD", "CSCO", "AVGO", "QCOM", "TXN", "COST", "PEP",
    "TMUS", "CMCSA", "AMGN", "HON", "LIN", "UNH", "JNJ", "V", "WMT", "PG",
    "MA", "HD", "BAC", "KO", "DIS", "VZ", "PYPL", "INTU", "ZM", "DOCU",
    "SHOP", "UBER", "LYFT", "SPOT", "PINS", "SNAP", "ROKU", "ETSY", "OKTA", "ZS",
    "CRWD", "DDOG", "TEAM", "PANW", "FTNT", "NOW", "PAYC", "WDAY", "HUBS", "MDB",
    "TTD", "RNG", "FIVN", "APP", "PLTR", "COIN", "HOOD", "DKNG", "RUM", "FUBO",
    "PTON", "TWLO", "SQ", "MELI", "BIDU", "JD", "NTES", "TCEHY", "BILI", "IQ",
    "XPEV", "LI", "NIO", "TSM", "ASML", "MU", "LRCX", "KLAC", "AMAT", "TER",
    "ENTG", "ON", "MPWR", "SWKS", "QRVO", "CRUS", "SYNA", "IDCC", "COMM", "VIAV",
    "EXTR", "CALX", "INFN",
];

/// The default stock universe followed by `extra` symbols, uppercased, with
/// blanks and duplicates removed (first occurrence wins).
pub fn stock_universe<S: AsRef<str>>(extra: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    NASDAQ_SYMBOLS
        .iter()
        .map(|s| s.to_string())
        .chain(extra.iter().map(|s| s.as_ref().trim().to_uppercase()))
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Splits a comma-separated symbol list, e.g. `"tsla, googl,,NFLX"`.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
