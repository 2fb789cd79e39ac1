//! Canonical structured event names used across `chanmux`.

// Worker lifecycle events.
pub const WORKER_START: &str = "worker_start";
pub const WORKER_START_REJECTED: &str = "worker_start_rejected";
pub const WORKER_STOP_REQUESTED: &str = "worker_stop_requested";
pub const WORKER_STOPPED: &str = "worker_stopped";
pub const WORKER_PANICKED: &str = "worker_panicked";

// Reader, writer and connector adapter events.
pub const READER_RESULT: &str = "reader_result";
pub const READER_TERMINAL: &str = "reader_terminal";
pub const READER_DISCONNECT_SUPPRESSED: &str = "reader_disconnect_suppressed";
pub const READER_CONSUMER_GONE: &str = "reader_consumer_gone";
pub const WRITER_WRITE_FAILED: &str = "writer_write_failed";
pub const WRITER_SEND_REJECTED: &str = "writer_send_rejected";
pub const WRITER_EXIT: &str = "writer_exit";
pub const CONNECTOR_CONNECT_OK: &str = "connector_connect_ok";
pub const CONNECTOR_CONNECT_FAILED: &str = "connector_connect_failed";
pub const CONNECTOR_STREAM_ENDED: &str = "connector_stream_ended";
pub const CONNECTOR_MESSAGE_REJECTED: &str = "connector_message_rejected";
pub const CONNECTOR_TICK: &str = "connector_tick";
pub const CONNECTOR_CLOSED: &str = "connector_closed";

// Data-plane stage events.
pub const PIPE_PAUSED: &str = "pipe_paused";
pub const PIPE_RESUMED: &str = "pipe_resumed";
pub const PIPE_INPUT_CLOSED: &str = "pipe_input_closed";
pub const PIPE_OUTPUT_CLOSED: &str = "pipe_output_closed";
pub const PIPE_FINISHED: &str = "pipe_finished";
pub const FAN_OUT_LISTENER_ADD: &str = "fan_out_listener_add";
pub const FAN_OUT_LISTENER_DUPLICATE: &str = "fan_out_listener_duplicate";
pub const FAN_OUT_LISTENER_REMOVE: &str = "fan_out_listener_remove";
pub const FAN_OUT_LISTENER_DROPPED: &str = "fan_out_listener_dropped";
pub const FAN_OUT_INPUT_CLOSED: &str = "fan_out_input_closed";
pub const FAN_OUT_CLOSED: &str = "fan_out_closed";
pub const FAN_IN_INPUT_ADD: &str = "fan_in_input_add";
pub const FAN_IN_INPUT_REMOVE: &str = "fan_in_input_remove";
pub const FAN_IN_INPUT_CLOSED: &str = "fan_in_input_closed";
pub const FAN_IN_CLOSED: &str = "fan_in_closed";
pub const REDUCER_FLUSH: &str = "reducer_flush";
pub const REDUCER_OUTPUT_CLOSED: &str = "reducer_output_closed";
pub const REDUCER_FINISHED: &str = "reducer_finished";

// Hub control-plane and routing events.
pub const HUB_CLIENT_CONNECT: &str = "hub_client_connect";
pub const HUB_CLIENT_DISCONNECT: &str = "hub_client_disconnect";
pub const HUB_SUBSCRIBE: &str = "hub_subscribe";
pub const HUB_UNSUBSCRIBE: &str = "hub_unsubscribe";
pub const HUB_CONTROL_UNKNOWN_CLIENT: &str = "hub_control_unknown_client";
pub const HUB_PUBLISH: &str = "hub_publish";
pub const HUB_DELIVERY_FAILED: &str = "hub_delivery_failed";
pub const HUB_DELIVERY_ABORTED: &str = "hub_delivery_aborted";
pub const HUB_CALLBACK_DROPPED: &str = "hub_callback_dropped";
pub const HUB_READER_CLOSED: &str = "hub_reader_closed";
pub const HUB_TICK: &str = "hub_tick";
