mod helpers;

mod http_test;
mod scenario_test;
mod smtp_test;
