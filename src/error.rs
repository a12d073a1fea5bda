use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum SourceError {
    #[display("request to {source_name} failed")]
    Request { source_name: String },
    #[display("{source_name} answered with HTTP {status}")]
    Status { source_name: String, status: u16 },
    #[display("failed to parse response from {source_name}")]
    ResponseParse { source_name: String },
    #[display("failed to decode candle row: {reason}")]
    Decode { reason: String },
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("unknown indicator: {id}")]
    UnknownIndicator { id: String },
    #[display("no indicator instance {instance_id} on this chart")]
    UnknownInstance { instance_id: String },
}
