mod postgres_security_event_repository;

pub use postgres_security_event_repository::PostgresSecurityEventRepository;
