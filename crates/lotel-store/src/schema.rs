pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS traces (
  trace_id       VARCHAR NOT NULL,
  span_id        VARCHAR NOT NULL,
  parent_span_id VARCHAR,
  name           VARCHAR NOT NULL,
  kind           INTEGER,
  start_time     TIMESTAMP NOT NULL,
  end_time       TIMESTAMP,
  duration_ns    BIGINT,
  status_code    INTEGER,
  service_name   VARCHAR NOT NULL,
  attributes     JSON,
  date           DATE NOT NULL
);

CREATE TABLE IF NOT EXISTS metrics (
  metric_name              VARCHAR NOT NULL,
  metric_type              VARCHAR NOT NULL,
  value                    DOUBLE,
  timestamp                TIMESTAMP NOT NULL,
  service_name             VARCHAR NOT NULL,
  aggregation_temporality  INTEGER,
  is_monotonic             BOOLEAN,
  unit                     VARCHAR,
  attributes               JSON,
  date                     DATE NOT NULL
);

CREATE TABLE IF NOT EXISTS logs (
  timestamp       TIMESTAMP NOT NULL,
  severity        VARCHAR,
  severity_number INTEGER,
  body            VARCHAR,
  service_name    VARCHAR NOT NULL,
  trace_id        VARCHAR,
  span_id         VARCHAR,
  attributes      JSON,
  date            DATE NOT NULL
);
"#;
