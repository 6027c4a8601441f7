//! HTML pages for browsers: the directory index and the live follow view.

use crate::listing::DirectoryEntry;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{title}}</title>
<style>
body { font-family: sans-serif; margin: 1em; }
table { border-collapse: collapse; width: 100%; }
th, td { padding: 0.25em 0.75em; text-align: left; border-bottom: 1px solid #ddd; }
th.sortable { cursor: pointer; }
.td_right { text-align: right; }
</style>
</head>
<body>
<h1>{{title}}</h1>
<form id="uploadForm">
<input type="file" name="up" id="up">
<button type="submit" id="uploadButton">Upload</button>
</form>
<table>
<thead><tr>
<th>Name</th><th></th><th>Modified</th>
<th class="sortable td_right" id="thSizeHuman">Size</th>
<th class="sortable td_right" id="thSize">Bytes</th>
</tr></thead>
<tbody id="tbFiles"></tbody>
</table>
<script>
window.fileList = {{entries}};

function humanFileSize(bytes) {
    const units = ['B', 'KiB', 'MiB', 'GiB', 'TiB'];
    let i = 0;
    while (bytes >= 1024 && i < units.length - 1) { bytes /= 1024; i++; }
    return (i === 0 ? bytes : bytes.toFixed(1)) + ' ' + units[i];
}

function cell(tr, content, right) {
    const td = document.createElement('td');
    if (content instanceof Node) { td.appendChild(content); } else { td.textContent = content; }
    if (right) { td.classList.add('td_right'); }
    tr.appendChild(td);
}

function link(text, href) {
    const a = document.createElement('a');
    a.textContent = text;
    a.href = href;
    return a;
}

function fillFileListTable(fileList) {
    const tbFiles = document.getElementById('tbFiles');
    tbFiles.innerHTML = '';
    for (const entry of fileList) {
        const tr = document.createElement('tr');
        const name = entry.kind === 'directory' ? '\u{1F4C1}' + entry.name + '/' : entry.name;
        cell(tr, entry.kind === 'unreadable' ? name : link(name, entry.href));
        cell(tr, entry.follow ? link('tail -f', entry.href + '?tail_f=1') : '');
        cell(tr, entry.modified ? new Date(entry.modified * 1000).toLocaleString() : '');
        cell(tr, humanFileSize(entry.size), true);
        cell(tr, String(entry.size), true);
        tbFiles.appendChild(tr);
    }
}

document.addEventListener('DOMContentLoaded', function () {
    fillFileListTable(window.fileList);
    const toggleSizeSort = function (ev) {
        if (ev.target.textContent.endsWith('↓')) {
            ev.target.textContent = ev.target.textContent.slice(0, -1);
            fillFileListTable(window.fileList);
        } else {
            ev.target.textContent += '↓';
            fillFileListTable([...window.fileList].sort((a, b) => b.size - a.size));
        }
    };
    document.getElementById('thSizeHuman').addEventListener('click', toggleSizeSort);
    document.getElementById('thSize').addEventListener('click', toggleSizeSort);
    document.getElementById('uploadForm').addEventListener('submit', function (ev) {
        ev.preventDefault();
        const button = document.getElementById('uploadButton');
        button.setAttribute('disabled', 'disabled');
        fetch(window.location.pathname, { method: 'POST', body: new FormData(ev.target) })
            .then((rsp) => rsp.text())
            .then((text) => { alert(text); window.location.reload(); })
            .catch(() => alert('There was an error attempting to upload the file.'))
            .finally(() => button.removeAttribute('disabled'));
    });
});
</script>
</body>
</html>
"#;

const TAIL_F_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>tail -f {{title}}</title>
<style>
body { margin: 0; background: #111; color: #ddd; }
#status { position: fixed; top: 0; right: 0; padding: 0.25em 0.5em; background: #333; font: 12px sans-serif; }
pre { margin: 0; padding: 0.5em; white-space: pre-wrap; word-break: break-all; }
</style>
</head>
<body>
<div id="status">connecting</div>
<pre id="output"></pre>
<script>
const output = document.getElementById('output');
const status = document.getElementById('status');
const decoder = new TextDecoder();
const scheme = window.location.protocol === 'https:' ? 'wss://' : 'ws://';
const socket = new WebSocket(scheme + window.location.host + {{ws_path}});
socket.binaryType = 'arraybuffer';
socket.onopen = () => { status.textContent = 'following'; };
socket.onclose = () => { status.textContent = 'closed'; };
socket.onmessage = (ev) => {
    const atBottom = window.innerHeight + window.scrollY >= document.body.scrollHeight - 4;
    output.appendChild(document.createTextNode(decoder.decode(ev.data, { stream: true })));
    if (atBottom) { window.scrollTo(0, document.body.scrollHeight); }
};
</script>
</body>
</html>
"#;

/// Directory index; entries are rendered client side from embedded JSON.
pub fn index_page(title: &str, entries: &[DirectoryEntry]) -> Result<String, serde_json::Error> {
    let entries = script_json(&serde_json::to_string(entries)?);
    Ok(INDEX_HTML
        .replace("{{title}}", &escape_html(title))
        .replace("{{entries}}", &entries))
}

/// Page that opens a WebSocket on `url_path` and prints what arrives.
pub fn tail_f_page(title: &str, url_path: &str) -> Result<String, serde_json::Error> {
    let ws_path = script_json(&serde_json::to_string(&encode_url_path(url_path))?);
    Ok(TAIL_F_HTML
        .replace("{{title}}", &escape_html(title))
        .replace("{{ws_path}}", &ws_path))
}

fn encode_url_path(url_path: &str) -> String {
    url_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// JSON embedded in a `<script>` must not close the element early.
fn script_json(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
