// Route modules for the relay server
pub mod admin; // Server push and presence listing
pub mod websocket; // Client WebSocket endpoint
