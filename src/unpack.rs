//! Desempaquetado de contenedores de correo (.eml/.msg) vía `mail-parser`.
//!
//! Cada fichero de entrada produce al menos un fichero de salida: un `.eml`
//! se expande en un cuerpo sintético más sus adjuntos; cualquier fallo
//! degrada por fichero sin abortar el lote.

use mail_parser::{MessageParser, MimeHeaders};
use thiserror::Error;
use tracing::warn;

use crate::models::UploadedFile;
use crate::normalize;

const BODY_PLACEHOLDER: &str = "No text body found in email.";
const GENERIC_ATTACHMENT_TYPE: &str = "application/octet-stream";

/// Fallo al desempaquetar un contenedor de mensaje. «Librería no disponible»
/// y «librería falló» comparten canal: ambos acaban en el mismo fallback.
#[derive(Debug, Error)]
pub enum UnpackError {
    #[error("no se pudo parsear el contenedor de mensaje: {message}")]
    Parse { message: String },

    #[error("no hay lector disponible para este formato de mensaje")]
    ReaderUnavailable,
}

/// Lector de contenedores binarios tipo Outlook `.msg`: produce el fichero
/// de cuerpo a partir de su campo `body` y materializa cada adjunto.
pub trait MessageReader: Send + Sync {
    fn unpack(&self, file: &UploadedFile) -> Result<Vec<UploadedFile>, UnpackError>;
}

/// Capacidad opcional: el lector `.msg` de este build.
// TODO: conectar un lector OLE/CFB para .msg cuando se adopte uno.
pub fn msg_reader() -> Option<&'static dyn MessageReader> {
    None
}

/// Expande la lista de ficheros seleccionados: los contenedores de correo se
/// despliegan en cuerpo + adjuntos, el resto pasa sin tocar. Conserva el
/// orden de entrada y la expansión de cada fichero queda contigua.
pub fn expand_files(files: Vec<UploadedFile>) -> Vec<UploadedFile> {
    let mut out = Vec::with_capacity(files.len());
    for file in files {
        expand_one(file, &mut out);
    }
    out
}

fn expand_one(file: UploadedFile, out: &mut Vec<UploadedFile>) {
    match normalize::extension(&file.name).as_deref() {
        Some("eml") => match unpack_eml(&file) {
            Ok(mut expanded) => out.append(&mut expanded),
            Err(err) => {
                warn!("Fallo al procesar el correo '{}': {err}. Se reemite como texto plano.", file.name);
                // Un .eml es texto: leerlo tal cual es mejor que descartarlo.
                out.push(UploadedFile {
                    name: file.name,
                    content_type: Some("text/plain".to_string()),
                    bytes: file.bytes,
                });
            }
        },
        Some("msg") => {
            let outcome = match msg_reader() {
                Some(reader) => reader.unpack(&file),
                None => Err(UnpackError::ReaderUnavailable),
            };
            match outcome {
                Ok(mut expanded) => out.append(&mut expanded),
                Err(err) => {
                    warn!("Fallo al procesar el correo '{}': {err}. Se reemite sin cambios.", file.name);
                    // Contenedor binario: reemitir los bytes originales deja que
                    // el destino lo rechace con un error claro en vez de
                    // corromper el contenido.
                    out.push(file);
                }
            }
        }
        _ => out.push(file),
    }
}

fn unpack_eml(file: &UploadedFile) -> Result<Vec<UploadedFile>, UnpackError> {
    let message = MessageParser::default()
        .parse(&file.bytes)
        .ok_or_else(|| UnpackError::Parse {
            message: format!("mensaje MIME ilegible ({} bytes)", file.bytes.len()),
        })?;

    // Cuerpo sintético: texto plano, si no HTML, si no el marcador literal.
    let body = message
        .body_text(0)
        .map(|s| s.to_string())
        .or_else(|| message.body_html(0).map(|s| s.to_string()))
        .unwrap_or_else(|| BODY_PLACEHOLDER.to_string());

    let mut out = vec![UploadedFile {
        name: format!("{}_body.txt", file.name),
        content_type: Some("text/plain".to_string()),
        bytes: body.into_bytes(),
    }];

    for (index, attachment) in message.attachments().enumerate() {
        let name = attachment
            .attachment_name()
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("attachment-{}", index + 1));

        let content_type = attachment
            .content_type()
            .map(|ct| {
                let ctype = ct.ctype();
                if let Some(subtype) = ct.subtype() {
                    format!("{ctype}/{subtype}")
                } else {
                    ctype.to_string()
                }
            })
            .unwrap_or_else(|| GENERIC_ATTACHMENT_TYPE.to_string());

        out.push(UploadedFile {
            name,
            content_type: Some(content_type),
            bytes: attachment.contents().to_vec(),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content_type: Option<&str>, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            content_type: content_type.map(|s| s.to_string()),
            bytes: bytes.to_vec(),
        }
    }

    const SIMPLE_EML: &str = "\
From: Broker <broker@example.com>\r\n\
To: Underwriting <uw@example.com>\r\n\
Subject: Slip de la póliza\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Adjunto los datos del cliente.\r\n";

    const EML_WITH_ATTACHMENT: &str = "\
From: broker@example.com\r\n\
To: uw@example.com\r\n\
Subject: Slip\r\n\
Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain\r\n\
\r\n\
Cuerpo del correo\r\n\
--b1\r\n\
Content-Type: application/pdf; name=\"doc.pdf\"\r\n\
Content-Disposition: attachment; filename=\"doc.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--b1--\r\n";

    #[test]
    fn eml_simple_produce_el_cuerpo_sintetico() {
        let out = expand_files(vec![file("slip.eml", None, SIMPLE_EML.as_bytes())]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "slip.eml_body.txt");
        assert_eq!(out[0].content_type.as_deref(), Some("text/plain"));
        let body = String::from_utf8(out[0].bytes.clone()).unwrap();
        assert!(body.contains("Adjunto los datos"));
    }

    #[test]
    fn eml_con_adjunto_expande_cuerpo_y_adjunto() {
        let out = expand_files(vec![file("slip.eml", None, EML_WITH_ATTACHMENT.as_bytes())]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "slip.eml_body.txt");
        assert_eq!(out[1].name, "doc.pdf");
        assert_eq!(out[1].content_type.as_deref(), Some("application/pdf"));
        assert_eq!(out[1].bytes, b"%PDF-1.4");
    }

    #[test]
    fn eml_ilegible_degrada_a_texto_plano() {
        // Entrada vacía: el parser no puede producir mensaje alguno.
        let out = expand_files(vec![file("roto.eml", None, b"")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn msg_sin_lector_pasa_sin_cambios() {
        let bytes = b"\xd0\xcf\x11\xe0binario";
        let out = expand_files(vec![file("correo.msg", Some("application/vnd.ms-outlook"), bytes)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "correo.msg");
        assert_eq!(out[0].bytes, bytes.to_vec());
        assert_eq!(out[0].content_type.as_deref(), Some("application/vnd.ms-outlook"));
    }

    #[test]
    fn otros_ficheros_pasan_identicos() {
        let original = file("poliza.pdf", Some("application/pdf"), b"%PDF-1.7");
        let out = expand_files(vec![original.clone()]);
        assert_eq!(out, vec![original]);
    }

    #[test]
    fn la_expansion_conserva_el_orden_y_es_contigua() {
        let out = expand_files(vec![
            file("a.pdf", Some("application/pdf"), b"%PDF"),
            file("slip.eml", None, EML_WITH_ATTACHMENT.as_bytes()),
            file("z.txt", None, b"notas"),
        ]);
        let names: Vec<&str> = out.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "slip.eml_body.txt", "doc.pdf", "z.txt"]);
    }

    #[test]
    fn cada_entrada_produce_al_menos_una_salida() {
        let inputs = vec![
            file("roto.eml", None, b""),
            file("correo.msg", None, b"basura"),
            file("doc.docx", None, b"PK"),
        ];
        let count = inputs.len();
        let out = expand_files(inputs);
        assert!(out.len() >= count);
    }
}
