pub use self::log_transport::LogTransport;
pub use self::smtp_transport::SmtpTransport;
pub use self::test_transport::TestTransport;
pub use self::transport::MailTransport;

pub mod log_transport;
pub mod smtp_transport;
pub mod test_transport;
pub mod transport;
