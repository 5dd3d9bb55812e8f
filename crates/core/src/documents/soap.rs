//! SOAP client for the GDEBA listing and content services.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{DocumentError, DocumentService, TokenProvider};
use crate::casefile::CaseFileId;
use crate::config::ServicesConfig;

const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Element carrying one document id in the listing response.
const LISTING_ELEMENT: &str = "documentosOficiales";

/// Element carrying the base64 PDF in the content response.
const CONTENT_ELEMENT: &str = "return";

/// SOAP 1.1 client for `consultarExpedienteDetallado` and `buscarPDFPorNumero`.
pub struct SoapDocumentService {
    client: Client,
    tokens: Arc<dyn TokenProvider>,
    listing_url: String,
    listing_namespace: String,
    content_url: String,
    content_namespace: String,
}

impl SoapDocumentService {
    pub fn new(
        config: &ServicesConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, DocumentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocumentError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            tokens,
            listing_url: endpoint(&config.listing_url),
            listing_namespace: config.listing_namespace.clone(),
            content_url: endpoint(&config.content_url),
            content_namespace: config.content_namespace.clone(),
        })
    }

    async fn call(&self, url: &str, envelope: String) -> Result<String, DocumentError> {
        let token = self.tokens.token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", "\"\"")
            .body(envelope)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DocumentError::Unauthorized(format!(
                "{} returned {}",
                url, status
            )));
        }
        if !status.is_success() {
            // SOAP faults travel with HTTP 500
            if let Some(fault) = find_fault(&body) {
                return Err(DocumentError::Fault(fault));
            }
            return Err(DocumentError::Http {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl DocumentService for SoapDocumentService {
    async fn list_documents(&self, case_file: &CaseFileId) -> Result<Vec<String>, DocumentError> {
        debug!(case_file = %case_file, "Listing case file documents");
        let envelope = listing_envelope(&self.listing_namespace, case_file.as_str());
        let body = self.call(&self.listing_url, envelope).await?;
        parse_elements(&body, LISTING_ELEMENT)
    }

    async fn fetch_document(
        &self,
        document_id: &str,
        requesting_user: &str,
    ) -> Result<Vec<u8>, DocumentError> {
        debug!(document_id, requesting_user, "Fetching document");
        let envelope = content_envelope(&self.content_namespace, document_id, requesting_user);
        let body = self.call(&self.content_url, envelope).await?;
        let encoded = parse_elements(&body, CONTENT_ELEMENT)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DocumentError::InvalidResponse(format!("no <{}> element", CONTENT_ELEMENT))
            })?;
        decode_content(&encoded)
    }
}

/// Strips a `?wsdl` suffix so WSDL URLs can be used as endpoints.
fn endpoint(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    match lower.rfind("?wsdl") {
        Some(idx) if idx + 5 == lower.len() => url[..idx].to_string(),
        _ => url.to_string(),
    }
}

fn envelope(namespace: &str, body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<soapenv:Envelope xmlns:soapenv="{}" xmlns:ns="{}">"#,
            "<soapenv:Header/><soapenv:Body>{}</soapenv:Body></soapenv:Envelope>"
        ),
        SOAP_ENV_NS,
        escape(namespace),
        body
    )
}

fn listing_envelope(namespace: &str, case_file: &str) -> String {
    envelope(
        namespace,
        &format!(
            "<ns:consultarExpedienteDetallado><numeroExpediente>{}</numeroExpediente></ns:consultarExpedienteDetallado>",
            escape(case_file)
        ),
    )
}

fn content_envelope(namespace: &str, document_id: &str, requesting_user: &str) -> String {
    envelope(
        namespace,
        &format!(
            concat!(
                "<ns:buscarPDFPorNumero><request>",
                "<assignee>false</assignee>",
                "<numeroDocumento>{}</numeroDocumento>",
                "<usuarioConsulta>{}</usuarioConsulta>",
                "</request></ns:buscarPDFPorNumero>"
            ),
            escape(document_id),
            escape(requesting_user)
        ),
    )
}

/// Collects the text of every `wanted` element, failing on a SOAP fault.
fn parse_elements(xml: &str, wanted: &str) -> Result<Vec<String>, DocumentError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut values = Vec::new();
    let mut in_fault = false;
    let mut fault_string = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "Fault" {
                    in_fault = true;
                }
                stack.push(name);
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| DocumentError::InvalidResponse(e.to_string()))?;
                match stack.last().map(String::as_str) {
                    Some("faultstring") if in_fault => fault_string = Some(text.into_owned()),
                    Some(name) if name == wanted => values.push(text.into_owned()),
                    _ => {}
                }
            }
            Ok(Event::CData(c)) => {
                if stack.last().map(String::as_str) == Some(wanted) {
                    values.push(String::from_utf8_lossy(&c.into_inner()).into_owned());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DocumentError::InvalidResponse(format!(
                    "malformed XML at {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if in_fault {
        return Err(DocumentError::Fault(
            fault_string.unwrap_or_else(|| "unspecified fault".to_string()),
        ));
    }
    Ok(values)
}

fn find_fault(xml: &str) -> Option<String> {
    match parse_elements(xml, "") {
        Err(DocumentError::Fault(message)) => Some(message),
        _ => None,
    }
}

fn decode_content(encoded: &str) -> Result<Vec<u8>, DocumentError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| DocumentError::InvalidResponse(format!("document is not base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_RESPONSE: &str = r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <ns2:consultarExpedienteDetalladoResponse xmlns:ns2="http://ar.gob.gba.gdeba.ee.expediente.services/">
      <return>
        <codigoTrata>GENE0001</codigoTrata>
        <documentosOficiales>IF-2023-00000001-GDEBA-A</documentosOficiales>
        <documentosOficiales>IF-2023-00000002-GDEBA-A</documentosOficiales>
        <estado>Tramitacion</estado>
      </return>
    </ns2:consultarExpedienteDetalladoResponse>
  </soap:Body>
</soap:Envelope>"#;

    const FAULT_RESPONSE: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <soap:Fault>
      <faultcode>soap:Server</faultcode>
      <faultstring>El expediente no existe</faultstring>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#;

    #[test]
    fn test_parse_listing() {
        let docs = parse_elements(LISTING_RESPONSE, LISTING_ELEMENT).unwrap();
        assert_eq!(
            docs,
            vec!["IF-2023-00000001-GDEBA-A", "IF-2023-00000002-GDEBA-A"]
        );
    }

    #[test]
    fn test_parse_listing_without_documents() {
        let xml = r#"<Envelope><Body><r><return><estado>x</estado></return></r></Body></Envelope>"#;
        assert!(parse_elements(xml, LISTING_ELEMENT).unwrap().is_empty());
    }

    #[test]
    fn test_parse_fault() {
        let err = parse_elements(FAULT_RESPONSE, LISTING_ELEMENT).unwrap_err();
        match err {
            DocumentError::Fault(message) => assert_eq!(message, "El expediente no existe"),
            other => panic!("expected fault, got {:?}", other),
        }
        assert_eq!(
            find_fault(FAULT_RESPONSE).as_deref(),
            Some("El expediente no existe")
        );
        assert!(find_fault(LISTING_RESPONSE).is_none());
    }

    #[test]
    fn test_parse_content_and_decode() {
        let xml = r#"<Envelope><Body><buscarPDFPorNumeroResponse><return>JVBE
Ri0xLjQ=</return></buscarPDFPorNumeroResponse></Body></Envelope>"#;
        let encoded = parse_elements(xml, CONTENT_ELEMENT).unwrap();
        let bytes = decode_content(&encoded[0]).unwrap();
        assert_eq!(bytes, b"%PDF-1.4");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_content("not*base64"),
            Err(DocumentError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_envelopes_escape_input() {
        let xml = listing_envelope("urn:test", "EX-2023-1- -GDEBA-A#B");
        assert!(xml.contains("<numeroExpediente>EX-2023-1- -GDEBA-A#B</numeroExpediente>"));

        let xml = content_envelope("urn:test", "IF<1>", "user&co");
        assert!(xml.contains("<numeroDocumento>IF&lt;1&gt;</numeroDocumento>"));
        assert!(xml.contains("<usuarioConsulta>user&amp;co</usuarioConsulta>"));
        assert!(xml.contains("<assignee>false</assignee>"));
        // round-trips through the parser
        assert_eq!(
            parse_elements(&xml, "usuarioConsulta").unwrap(),
            vec!["user&co"]
        );
    }

    #[test]
    fn test_endpoint_strips_wsdl() {
        assert_eq!(
            endpoint("https://iop.example.org/Expediente?wsdl"),
            "https://iop.example.org/Expediente"
        );
        assert_eq!(
            endpoint("https://iop.example.org/Expediente?WSDL"),
            "https://iop.example.org/Expediente"
        );
        assert_eq!(
            endpoint("https://iop.example.org/Expediente"),
            "https://iop.example.org/Expediente"
        );
    }
}
