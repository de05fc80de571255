pub mod evaluation;
pub mod forecast_assembler;
pub mod onnx_predictor;
pub mod predictor;
pub mod recursive_forecaster;
pub mod scaler;
pub mod smartcore_predictor;
pub mod temporal_splitter;
pub mod window_sequencer;
