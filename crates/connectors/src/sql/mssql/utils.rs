use crate::sql::base::error::ConnectorError;
use tiberius::{Client, Config, error::Error as TdsError};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

pub type MssqlClient = Client<Compat<TcpStream>>;

/// Accepts ADO.NET (`server=tcp:host,1433;...`) and JDBC
/// (`jdbc:sqlserver://host:1433;...`) connection strings.
pub(crate) fn parse_config(locator: &str) -> Result<Config, ConnectorError> {
    let locator = locator.trim();
    let parsed = if locator.to_ascii_lowercase().starts_with("jdbc:") {
        Config::from_jdbc_string(locator)
    } else {
        Config::from_ado_string(locator)
    };
    parsed.map_err(|e| ConnectorError::InvalidUrl(e.to_string()))
}

pub(crate) async fn connect_client(locator: &str) -> Result<MssqlClient, ConnectorError> {
    let mut config = parse_config(locator)?;

    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        // Azure SQL may hand the login off to another node.
        Err(TdsError::Routing { host, port }) => {
            debug!(%host, port, "SQL Server login redirected");
            config.host(&host);
            config.port(port);
            let tcp = TcpStream::connect(config.get_addr()).await?;
            tcp.set_nodelay(true)?;
            Ok(Client::connect(config, tcp.compat_write()).await?)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ado_and_jdbc() {
        assert!(parse_config("server=tcp:localhost,1433;database=crm;user=sa;password=x;TrustServerCertificate=true").is_ok());
        assert!(parse_config("jdbc:sqlserver://localhost:1433;databaseName=crm;user=sa;password=x").is_ok());
    }
}
