//! Shared fixtures for integration tests
//!
//! A small but complete batch: a sale, its devolution, a symbolic
//! remittance, the sale's cancellation, a transport manifest pointing at
//! the sale, a number denial, plus one malformed and one foreign file.

#![allow(dead_code)]

use assert_fs::prelude::*;
use std::path::Path;

pub const SALE: &str = "35240112345678000195550010000000011123456789";
pub const DEVOLUTION: &str = "35240112345678000195550010000000021123456794";
pub const REMITTANCE: &str = "35240112345678000195550010000000031123456708";
pub const MANIFEST: &str = "35240111222333000181570010000000551123400004";
pub const DENIAL_ID: &str = "ID35241234567800019555001000000010000000020";

/// Keys after moving to 2024-03 under tax id 98765432000110.
pub const SALE_NEW: &str = "35240398765432000110550010000000011123456784";
pub const DEVOLUTION_NEW: &str = "35240398765432000110550010000000021123456790";
pub const REMITTANCE_NEW: &str = "35240398765432000110550010000000031123456703";
pub const MANIFEST_NEW: &str = "35240311222333000181570010000000551123400000";
pub const DENIAL_ID_NEW: &str = "ID35249876543200011055001000000010000000020";

pub const NEW_TAX_ID: &str = "98765432000110";

fn invoice(key: &str, number: &str, nature: &str, cfop: &str, reference: Option<&str>, note: Option<&str>) -> String {
    let nfref = reference
        .map(|r| format!("<NFref><refNFe>{r}</refNFe></NFref>"))
        .unwrap_or_default();
    let adic = note
        .map(|n| format!("<infAdic><obsCont xCampo=\"tag\"><xTexto>{n}</xTexto></obsCont></infAdic>"))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00"><NFe xmlns="http://www.portalfiscal.inf.br/nfe"><infNFe Id="NFe{key}" versao="4.00">
<ide><cUF>35</cUF><natOp>{nature}</natOp><mod>55</mod><serie>1</serie><nNF>{number}</nNF><dhEmi>2024-01-10T09:00:00-03:00</dhEmi>{nfref}</ide>
<emit><CNPJ>12345678000195</CNPJ><xNome>ORIGEM COMERCIO LTDA</xNome><enderEmit><xLgr>RUA VELHA</xLgr><nro>1</nro><xBairro>JARDIM</xBairro><xMun>CAMPINAS</xMun><UF>SP</UF><CEP>13000000</CEP></enderEmit></emit>
<det nItem="1"><prod><cProd>A1</cProd><cEAN>SEM GTIN</cEAN><xProd>CANECA</xProd><CFOP>{cfop}</CFOP><vProd>100.00</vProd></prod>
<imposto><ICMS><ICMS00><CST>00</CST><pICMS>12.00</pICMS></ICMS00></ICMS></imposto></det>
{adic}</infNFe></NFe><protNFe versao="4.00"><infProt><chNFe>{key}</chNFe><dhRecbto>2024-01-10T09:00:05-03:00</dhRecbto></infProt></protNFe></nfeProc>
"#
    )
}

pub fn sale_xml() -> String {
    invoice(SALE, "1", "Venda de mercadoria", "5102", None, None)
}

pub fn devolution_xml() -> String {
    invoice(DEVOLUTION, "2", "Devolucao de mercadorias", "1202", Some(SALE), Some("DEVOLUTION_devolution"))
}

pub fn remittance_xml() -> String {
    invoice(REMITTANCE, "3", "Remessa para deposito", "5949", Some(SALE), None)
}

pub fn cancellation_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<procEventoNFe versao="1.00"><evento versao="1.00"><infEvento Id="ID110111{SALE}01"><chNFe>{SALE}</chNFe><dhEvento>2024-01-11T08:00:00-03:00</dhEvento><tpEvento>110111</tpEvento></infEvento></evento>
<retEvento versao="1.00"><infEvento><chNFe>{SALE}</chNFe><dhRegEvento>2024-01-11T08:00:05-03:00</dhRegEvento></infEvento></retEvento></procEventoNFe>
"#
    )
}

pub fn manifest_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<cteProc versao="4.00"><CTe><infCte Id="CTe{MANIFEST}" versao="4.00"><ide><nCT>55</nCT><dhEmi>2024-01-10T12:00:00-03:00</dhEmi></ide>
<rem><CNPJ>12345678000195</CNPJ><xNome>ORIGEM COMERCIO LTDA</xNome><enderReme><xLgr>RUA VELHA</xLgr><xMun>CAMPINAS</xMun></enderReme></rem>
<infCTeNorm><infDoc><infNFe><chave>{SALE}</chave></infNFe></infDoc></infCTeNorm></infCte></CTe>
<protCTe><infProt><chCTe>{MANIFEST}</chCTe><dhRecbto>2024-01-10T12:00:05-03:00</dhRecbto></infProt></protCTe></cteProc>
"#
    )
}

pub fn denial_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ProcInutNFe versao="4.00"><inutNFe><infInut Id="{DENIAL_ID}"><ano>24</ano><CNPJ>12345678000195</CNPJ><mod>55</mod><serie>1</serie><nNFIni>1</nNFIni><nNFFin>2</nNFFin></infInut></inutNFe>
<retInutNFe><infInut><dhRecbto>2024-01-12T10:00:00-03:00</dhRecbto></infInut></retInutNFe></ProcInutNFe>
"#
    )
}

/// Write the whole batch into `dir` under neutral names.
pub fn write_batch(dir: &Path) {
    let files = [
        ("a_sale.xml", sale_xml()),
        ("b_devolution.xml", devolution_xml()),
        ("c_remittance.xml", remittance_xml()),
        ("d_cancel.xml", cancellation_xml()),
        ("e_manifest.xml", manifest_xml()),
        ("f_denial.xml", denial_xml()),
        ("g_broken.xml", "<nfeProc><NFe></nfeProc>".to_string()),
        ("h_other.xml", "<?xml version=\"1.0\"?><catalogo><item/></catalogo>".to_string()),
    ];
    for (name, body) in files {
        std::fs::write(dir.join(name), body).expect("write fixture");
    }
}

/// Profile that moves the batch to 15/03/2024 under a new issuer.
pub const PROFILE_TOML: &str = r#"
name = "atlas"

[issuer]
CNPJ = "98.765.432/0001-10"
xNome = "ATLAS DISTRIBUICAO LTDA"
xLgr = "AV PAULISTA"
xMun = "SAO PAULO"

[date]
target = "15/03/2024"

[flags]
issuer = true
date = true
reference_rewrite = true
"#;

/// Temp dir holding `batch/` with the fixture files and `profiles/atlas.toml`.
pub fn make_workspace() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("batch")
        .create_dir_all()
        .expect("batch dir");
    write_batch(tmp.child("batch").path());
    tmp.child("profiles/atlas.toml")
        .write_str(PROFILE_TOML)
        .expect("write profile");
    tmp
}

/// Every file under `dir` with its bytes, sorted by name.
pub fn snapshot_dir(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut out: Vec<_> = std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let bytes = std::fs::read(e.path()).expect("read file");
            (name, bytes)
        })
        .collect();
    out.sort();
    out
}
